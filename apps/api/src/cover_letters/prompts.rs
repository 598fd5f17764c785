//! Prompt text for cover-letter improvement.

use std::collections::BTreeMap;

use crate::models::cover_letter::{CoverLetterFeatureRow, FeatureCategory};

const PERSONA: &str = "\
You are a cover letter consultant with twenty years of experience.
Analyze the cover letter below and write an improved version of it.

";

const REQUEST: &str = r#"## Task
Infer the target role and company from the cover letter and analyze it with that in mind.
Answer in exactly this JSON format:

{
  "feedback": {
    "strengths": [
      {
        "description": "What the letter does well, specifically",
        "suggestion": "How to develop it further"
      }
    ],
    "improvements": [
      {
        "description": "What needs work, specifically",
        "suggestion": "A concrete way to fix it"
      }
    ],
    "summary": "Overall summary of the analysis"
  },
  "improvedContent": "The complete improved cover letter"
}

"#;

const GUIDELINES: &str = "\
### Guidelines
1. **Context**: infer the role, industry and kind of company from the letter itself
2. **Improved letter**: keep the original's key experiences and results, rework wording and structure substantially
3. **Feedback**: keep description and suggestion short and to the point
4. **Format**: the answer must be valid JSON
";

/// Assembles the improvement prompt: persona, criteria by category, the
/// letter, the answer contract, guidelines.
pub fn build_improvement_prompt(content: &str, features: &[CoverLetterFeatureRow]) -> String {
    let mut prompt = String::from(PERSONA);
    prompt.push_str(&feature_criteria(features));
    prompt.push_str("## Cover letter to analyze\n");
    prompt.push_str(content);
    prompt.push_str("\n\n");
    prompt.push_str(REQUEST);
    prompt.push_str(GUIDELINES);
    prompt
}

/// Known categories sort first, in declaration order.
#[derive(PartialEq, Eq, PartialOrd, Ord)]
enum Heading<'a> {
    Known(FeatureCategory),
    Other(&'a str),
}

/// Groups feature descriptions under `### CATEGORY` headings.
fn feature_criteria(features: &[CoverLetterFeatureRow]) -> String {
    let mut grouped: BTreeMap<Heading<'_>, Vec<&str>> = BTreeMap::new();
    for feature in features {
        let heading = match feature.category.parse::<FeatureCategory>() {
            Ok(category) => Heading::Known(category),
            Err(_) => Heading::Other(&feature.category),
        };
        grouped.entry(heading).or_default().push(&feature.description);
    }

    let mut criteria = String::from("## What strong cover letters do\n");
    for (heading, descriptions) in grouped {
        criteria.push_str("### ");
        criteria.push_str(match heading {
            Heading::Known(category) => category.as_str(),
            Heading::Other(raw) => raw,
        });
        criteria.push('\n');
        for description in descriptions {
            criteria.push_str("- ");
            criteria.push_str(description);
            criteria.push('\n');
        }
        criteria.push('\n');
    }
    criteria
}
