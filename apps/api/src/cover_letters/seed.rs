//! Built-in cover-letter writing heuristics, inserted once into an empty
//! `cover_letter_features` table at startup.

use anyhow::Result;
use sqlx::PgPool;
use tracing::info;

use crate::models::cover_letter::FeatureCategory;

const STRUCTURE: [&str; 34] = [
    "States the motivation for applying and the core strength up front",
    "Orders experiences by importance rather than chronology",
    "Uses a heading per item so each part is easy to scan",
    "Opens every paragraph with its key message",
    "Keeps a logical introduction, body and conclusion",
    "Separates achievements from the experiences behind them and explains them step by step",
    "Builds a three-part structure around the core experience",
    "Summarizes the applicant in one line in the first paragraph",
    "Uses a situation, task, action, result (STAR) structure in the middle paragraphs",
    "Gives short background for every experience",
    "Closes with a summary tied to the target role",
    "Keeps paragraphs at a steady three to five sentences",
    "Presents varied examples without repeating the same experience",
    "Makes achievements concrete with numbers and statistics",
    "Keeps experiences unrelated to the role to a minimum",
    "Uses connectives where the logic needs them",
    "Links paragraphs with transitional phrases",
    "Keeps strengths and lessons from setbacks clearly apart",
    "Distributes length sensibly across the sections",
    "Places important content at the start of sentences",
    "Names the outcome of each experience",
    "Repeats the key message for emphasis",
    "Makes the logical link between sentences explicit",
    "Gives enough background and context for each experience",
    "Sums up result and lesson in a single sentence",
    "Every paragraph has a clear topic sentence",
    "Puts major achievements near the start of the paragraph",
    "Includes only experiences directly related to the role",
    "Carries a key term from the posting in every paragraph",
    "Outlines the overall structure in the introduction",
    "Arranges experiences and results in a logical order",
    "Applies the STAR structure to most experiences",
    "Restates strengths and motivation in the closing paragraph",
    "Keeps the whole letter balanced at two to three paragraphs",
];

const CONTENT: [&str; 33] = [
    "Names the applicant's role in team projects and its concrete results",
    "Describes the problem-solving process and actions in detail",
    "Quantifies results with metrics or figures",
    "Centers on the experiences most relevant to the job",
    "Builds around projects related to the target role",
    "Explains the problem and the solution step by step",
    "Condenses experiences into their outcomes",
    "States the applicant's contribution to the team clearly",
    "Grounds claims in real, specific cases",
    "Distinguishes responsibilities from the role played",
    "Highlights experiences that map to job competencies",
    "States what was learned from both successes and failures",
    "Shows collaboration and team contribution concretely",
    "Includes experiences that demonstrate problem solving",
    "Connects work results to job competencies",
    "Connects project goals clearly to their outcomes",
    "Gives concrete cases where specialist skills were applied",
    "Details the process and figures behind an achievement",
    "Includes self-initiated improvements or innovations",
    "Describes efficiency gains and how they were achieved",
    "Mentions job-related certifications or technical experience",
    "Explains each step taken while solving a problem",
    "Leads with results when summarizing an experience",
    "Includes examples of teamwork and communication",
    "Ties experiences to the core competencies of the role",
    "Mentions voluntary participation in projects",
    "Emphasizes the key actions that led to the result",
    "Shows the applicant taking the lead when problems arose",
    "Explains how hard the task was and how it was handled",
    "Presents clear cases of applying a skill or competency",
    "Shows improvements made along the way",
    "Stresses problem-solving experience relevant to the role",
    "Quantifies project results and the applicant's share in them",
];

const EXPRESSION: [&str; 33] = [
    "Sentences are concise and the key message is clear",
    "Connectives make the sentences flow naturally",
    "Uses active voice to leave a proactive impression",
    "Works job-related keywords in naturally",
    "Varies wording and avoids repeated words",
    "Uses emphasis sparingly to draw attention",
    "Sentence length varies while staying easy to read",
    "Uses technical terms appropriately without overdoing it",
    "Highlights experiences and results with concrete wording",
    "Sentences end cleanly and are easy to follow",
    "Uses sentence position to emphasize what matters",
    "Reads naturally from the reader's point of view",
    "Prefers positive phrasing to negative phrasing",
    "Includes numbers and indicators naturally",
    "Makes subject and verb explicit so the meaning is unambiguous",
    "Delivers one clear message per sentence",
    "Uses paragraph breaks to aid readability",
    "Uses action verbs for a dynamic tone",
    "Avoids repeated phrasing",
    "Every sentence carries a key term",
    "Reads smoothly and naturally",
    "Uses modifiers where they sharpen experiences and results",
    "Shapes sentences around results",
    "Places the key message at the beginning of the sentence",
    "Uses wording the reader grasps immediately",
    "Stays concise without heavy ornamentation",
    "Presents strengths without sounding boastful",
    "Expresses actions and results in concrete sentences",
    "Uses fitting analogies or examples to aid understanding",
    "Keeps a consistent, professional tone",
    "Is clear enough for an evaluator to follow at a glance",
    "Reinforces the important message through repetition",
    "Flows naturally so the whole letter is easy to read",
];

/// All built-in features in insertion order.
pub fn builtin_features() -> impl Iterator<Item = (FeatureCategory, &'static str)> {
    STRUCTURE
        .iter()
        .map(|d| (FeatureCategory::Structure, *d))
        .chain(CONTENT.iter().map(|d| (FeatureCategory::Content, *d)))
        .chain(EXPRESSION.iter().map(|d| (FeatureCategory::Expression, *d)))
}

/// Inserts the built-in features unless the table already has rows.
/// Returns the number of inserted rows.
pub async fn seed_features(db: &PgPool) -> Result<usize> {
    let existing: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM cover_letter_features")
        .fetch_one(db)
        .await?;
    if existing > 0 {
        info!("Cover letter features already present ({existing}), skipping seed");
        return Ok(0);
    }

    let mut tx = db.begin().await?;
    let mut inserted = 0;
    for (category, description) in builtin_features() {
        sqlx::query("INSERT INTO cover_letter_features (category, description) VALUES ($1, $2)")
            .bind(category.as_str())
            .bind(description)
            .execute(&mut *tx)
            .await?;
        inserted += 1;
    }
    tx.commit().await?;

    info!("Seeded {inserted} cover letter features");
    Ok(inserted)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_feature_counts() {
        let all: Vec<_> = builtin_features().collect();
        assert_eq!(all.len(), 100);

        let count = |c| all.iter().filter(|(cat, _)| *cat == c).count();
        assert_eq!(count(FeatureCategory::Structure), 34);
        assert_eq!(count(FeatureCategory::Content), 33);
        assert_eq!(count(FeatureCategory::Expression), 33);
    }

    #[test]
    fn test_builtin_features_are_not_blank() {
        assert!(builtin_features().all(|(_, d)| !d.trim().is_empty()));
    }
}
