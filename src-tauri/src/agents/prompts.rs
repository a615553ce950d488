//! System prompts and message templates.

pub const SPECIALIST_NAME: &str = "Transfer_Credit_Specialist";
pub const FORMATTER_NAME: &str = "list_agent";
pub const PROXY_NAME: &str = "Boss_Assistant";
pub const CHAT_ASSISTANT_NAME: &str = "assistant";

pub const SPECIALIST_SYSTEM: &str = "You are a transfer credit specialist at a college. \
Your job is to compare 2 syllabi to decide if the courses should transfer or not based on \
the 3 criteria: topics covered, credits and grading criteria. Give a match percentage for \
each criteria (example, 20% similarity for topics covered). In the end, give a final match \
percentage using the provided weights and a detailed summary explaining your decision. \
Use latex to format math equations.";

pub const FORMATTER_SYSTEM: &str = "Put all the percentage scores in a list as follows: \
[credits percentage, topics covered percentage, grading criteria percentage, final match \
percentage]. Do not return anything else.";

pub const CHAT_ASSISTANT_SYSTEM: &str =
    "You are given 2 course syllabi. Your job is to answer user's questions about the syllabi.";

pub const DEFAULT_AUTO_REPLY: &str = "Reply `TERMINATE` if the task is done.";

/// Marker a model replies with when the supplied context is not enough.
pub const UPDATE_CONTEXT: &str = "UPDATE CONTEXT";

const RETRIEVE_INSTRUCTIONS: &str = "You're a retrieve augmented chatbot. You answer user's \
questions based on your own knowledge and the context provided by the user.
If you can't answer the question with or without the current context, you should reply \
exactly `UPDATE CONTEXT`.";

pub fn retrieve_message(problem: &str, context: &str) -> String {
    format!(
        "{}\n\nUser's question is: {}\n\nContext is: {}\n",
        RETRIEVE_INSTRUCTIONS, problem, context
    )
}

/// Problem statement for a comparison run. Weights are passed through
/// verbatim; the specialist is asked, not forced, to apply them.
pub fn comparison_problem(
    source_course: &str,
    target_course: &str,
    topics_covered: u16,
    credits: u16,
    grading_criteria: u16,
) -> String {
    format!(
        "Will {source} transfer in as {target}? \n\
         Use the following weights to calculate the final match percentage: \
         {topics} for topics covered, {credits} for credits and {grading} for grading criteria.\n\
         Return the score percentages in a list. ",
        source = source_course,
        target = target_course,
        topics = topics_covered,
        credits = credits,
        grading = grading_criteria,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_comparison_problem_carries_weights_verbatim() {
        let problem = comparison_problem("CISC 110", "IST 110", 60, 40, 10);
        assert!(problem.starts_with("Will CISC 110 transfer in as IST 110?"));
        assert!(problem.contains(
            "60 for topics covered, 40 for credits and 10 for grading criteria"
        ));
    }

    #[test]
    fn test_retrieve_message_does_not_expand_placeholders_in_context() {
        let msg = retrieve_message("Q?", "literal {problem} in a syllabus");
        assert!(msg.contains("User's question is: Q?"));
        assert!(msg.contains("Context is: literal {problem} in a syllabus"));
    }
}
