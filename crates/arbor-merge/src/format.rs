//! Prompt assembly for each merge strategy
//!
//! Pure string builders; no completion calls happen here.

use crate::strategy::BranchContext;

const RAG_DELIMITER: &str = "========================================";

/// Escape the five XML metacharacters, `&` first
#[must_use]
pub fn escape_xml(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            other => out.push(other),
        }
    }
    out
}

/// `<branch>` block with id/name/turn-count attributes and escaped turns
#[must_use]
pub fn branch_as_xml(branch: &BranchContext) -> String {
    let turns = branch
        .path
        .iter()
        .enumerate()
        .map(|(idx, node)| {
            format!(
                "    <turn index=\"{}\">\n      <user>{}</user>\n      <assistant>{}</assistant>\n    </turn>",
                idx + 1,
                escape_xml(&node.prompt),
                escape_xml(&node.response),
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "<branch id=\"{}\" name=\"{}\" message_count=\"{}\">\n{}\n  </branch>",
        escape_xml(&branch.id.to_string()),
        escape_xml(&branch.name),
        branch.turn_count(),
        turns,
    )
}

/// `=== NAME ===` header followed by unescaped `User:`/`Assistant:` turns
#[must_use]
pub fn branch_as_plain_text(branch: &BranchContext) -> String {
    let turns = branch
        .path
        .iter()
        .map(|node| format!("User: {}\n\nAssistant: {}", node.prompt, node.response))
        .collect::<Vec<_>>()
        .join("\n\n---\n\n");

    format!("=== {} ===\n\n{}", branch.name.to_uppercase(), turns)
}

fn xml_blocks(branches: &[BranchContext]) -> String {
    branches
        .iter()
        .map(branch_as_xml)
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Prompt for the xml-context strategy
#[must_use]
pub fn xml_context_prompt(branches: &[BranchContext], question: &str) -> String {
    format!(
        "You are analyzing multiple conversation branches that explored different aspects of a topic. Each branch is wrapped in XML tags with metadata.

<context>
{context}
</context>

<instructions>
The user has selected these {count} branches to merge their insights. Each branch represents a different line of exploration from the same starting point.

When answering:
1. Consider ALL information from ALL branches
2. Reference specific branches by name when drawing conclusions
3. Identify agreements and contradictions between branches
4. Synthesize a comprehensive answer that leverages the full exploration
</instructions>

<user_query>{query}</user_query>

Please provide a thorough response based on the combined context from all branches:",
        context = xml_blocks(branches),
        count = branches.len(),
        query = escape_xml(question),
    )
}

/// Prompt for the rag strategy
#[must_use]
pub fn rag_prompt(branches: &[BranchContext], question: &str) -> String {
    let separator = format!("\n\n{RAG_DELIMITER}\n\n");
    let context = branches
        .iter()
        .map(branch_as_plain_text)
        .collect::<Vec<_>>()
        .join(&separator);

    format!(
        "You have access to multiple conversation branches exploring different aspects of a topic. Use this context to answer the user's question.

CONTEXT FROM BRANCHES:
{context}

{RAG_DELIMITER}

USER'S QUESTION: {question}

Based on the context from the different branches above, please provide a comprehensive answer that draws from all relevant information explored in these conversations."
    )
}

/// Per-branch prompt issued first by the summary strategy
#[must_use]
pub fn branch_summary_prompt(branch: &BranchContext) -> String {
    let text = branch
        .path
        .iter()
        .map(|node| format!("User: {}\nAssistant: {}", node.prompt, node.response))
        .collect::<Vec<_>>()
        .join("\n\n");

    format!(
        "Summarize the key points, decisions, and insights from this conversation in 3-5 bullet points:

{text}

Provide a concise summary:"
    )
}

/// Labelled summary block as it appears in the final summary prompt
#[must_use]
pub fn labelled_summary(branch: &BranchContext, summary: &str) -> String {
    format!("**{}:**\n{}", branch.name, summary)
}

/// Final prompt of the summary strategy over labelled per-branch summaries
#[must_use]
pub fn summary_final_prompt(summaries: &[String], question: &str) -> String {
    format!(
        "You have summaries from {count} different conversation branches that explored various aspects of a topic.

BRANCH SUMMARIES:
{joined}

{RAG_DELIMITER}

Based on these summaries, please answer the following question:
{question}

Provide a comprehensive response that synthesizes insights from all branches:",
        count = summaries.len(),
        joined = summaries.join("\n\n---\n\n"),
    )
}

/// Prompt for the comparative strategy
#[must_use]
pub fn comparative_prompt(branches: &[BranchContext], question: &str) -> String {
    format!(
        "You are performing a comparative analysis of {count} conversation branches that explored different approaches to a topic.

<branches>
{context}
</branches>

<analysis_task>
The user wants to understand: {query}

Please provide your response in this structured format:

## Common Ground
What ideas, facts, or conclusions appear consistently across all branches?

## Key Differences
What are the main points where the branches diverged or explored different directions?

## Branch-by-Branch Highlights
For each branch, what is its unique contribution or perspective?

## Synthesis & Recommendation
Based on the comparative analysis, provide your answer to the user's question with clear reasoning about which branch insights contributed to your conclusion.
</analysis_task>

Begin your comparative analysis:",
        count = branches.len(),
        context = xml_blocks(branches),
        query = escape_xml(question),
    )
}
