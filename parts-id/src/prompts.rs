//! Prompts sent to the vision models

use crate::scoring::QualityIssue;

/// Base auto parts identification prompt
///
/// Asks for a bare JSON object so [`crate::parser`] can pick it out directly.
pub const IDENTIFY_PROMPT: &str = r#"You are an expert eBay reseller specializing in auto parts.
Analyze the attached photos of a single auto part.

Identify:
- The specific part type (headlight vs tail light, left vs right side, OEM vs aftermarket)
- Brand or manufacturer
- Every visible part number, transcribed exactly
- Condition (new, used, remanufactured, damaged)
- Vehicles this part fits (make, model, year range)

Respond ONLY with a valid JSON object in this exact format:
{
  "part_name": "specific part name",
  "part_number": "primary part number or N/A if none is visible",
  "category": "part category",
  "condition": "condition or Unknown",
  "description": "professional listing description",
  "compatibility": ["vehicle fitments"],
  "brand": "manufacturer or empty string"
}

Do not include any text before or after the JSON object."#;

/// Build a re-prompt focused on the issues found in a previous attempt
pub fn enhanced_prompt(issues: &[QualityIssue]) -> String {
    let mut prompt = String::from(IDENTIFY_PROMPT);
    prompt.push_str("\n\nA previous analysis of these photos was incomplete. Pay particular attention to:");

    for issue in issues {
        let focus = match issue {
            QualityIssue::MissingPartNumber => {
                "Look carefully for any stamped, etched, molded or printed part numbers and label stickers"
            }
            QualityIssue::GenericName => "Identify the specific type of automotive component, not a general class",
            QualityIssue::BriefDescription => "Provide detailed technical specifications and features",
            QualityIssue::GenericDescription => "Describe this exact part rather than the generic part family",
        };
        prompt.push_str("\n- ");
        prompt.push_str(focus);
    }

    prompt
}
