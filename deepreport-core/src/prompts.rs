//! Prompt builders for every generator call.

use chrono::Utc;

/// Current date in a readable format, e.g. "March 04, 2025".
pub fn current_date() -> String {
    Utc::now().format("%B %d, %Y").to_string()
}

pub fn query_writer(topic: &str, number_queries: usize) -> String {
    format!(
        r#"Your goal is to generate sophisticated and diverse web search queries for an automated research tool.

Instructions:
- Prefer a single query; add more only when the question has several distinct aspects.
- Each query should focus on one specific aspect of the question.
- Do not produce more than {number_queries} queries.
- Do not produce near-duplicate queries.
- Queries should gather the most current information. The current date is {date}.

Format your response as a JSON object with exactly these keys:
- "rationale": brief explanation of why these queries are relevant
- "query": a list of search queries

Example:
```json
{{
    "rationale": "Revenue and unit sales need separate data points.",
    "query": ["Apple total revenue growth fiscal year 2024", "iPhone unit sales growth fiscal year 2024"]
}}
```

Context: {topic}"#,
        number_queries = number_queries,
        date = current_date(),
        topic = topic,
    )
}

pub fn reflection(topic: &str, summaries: &str) -> String {
    format!(
        r#"You are an expert research assistant analyzing summaries about "{topic}".

Instructions:
- Identify knowledge gaps or areas that need deeper exploration and generate follow-up queries.
- If the summaries are sufficient to answer the question, do not generate follow-up queries.
- Follow-up queries must be self-contained and include the context needed for a web search.

Format your response as a JSON object with exactly these keys:
- "is_sufficient": true or false
- "knowledge_gap": what information is missing ("" when sufficient)
- "follow_up_queries": list of specific queries addressing the gap ([] when sufficient)

Summaries:
{summaries}"#,
    )
}

pub fn answer(topic: &str, sources: &str) -> String {
    format!(
        r#"You are an expert research analyst writing a well-structured answer from the sources below.

Context:
- Current date: {date}
- Research topic: {topic}

Requirements:
- Combine knowledge base and web sources and distinguish between them.
- Cite every claim. Web sources: [Title](url). Knowledge base sources: [Title - Knowledge Base](knowledge-base://title).
- Only use URLs that appear in the sources. Never invent links.
- Finish with a References section.

Sources:
{sources}

Write the answer now:"#,
        date = current_date(),
    )
}

pub fn report_plan(topic: &str, target_words: usize) -> String {
    format!(
        r#"You are a professional research report planner. Create a detailed plan for the report below.

Topic: {topic}
Target length: {target_words} words

The plan needs:
1. A report title
2. An abstract of about 200 words
3. Sections, each with a name, a description of what it covers, whether it requires research (true/false), and a word count target

Requirements:
- Logical, complete structure with 5-8 sections
- Section word counts should add up to roughly the target length
- Section names must be distinct

Format your response as JSON:
{{
    "title": "Report title",
    "abstract": "Report abstract",
    "total_word_count_target": {target_words},
    "sections": [
        {{
            "name": "Section name",
            "description": "Section description",
            "requires_research": true,
            "word_count_target": 1500
        }}
    ]
}}"#,
    )
}

pub fn section_queries(name: &str, description: &str, target_words: usize, max_queries: usize) -> String {
    format!(
        r#"Generate 3 to {max_queries} targeted search queries for one section of a research report.

Section: {name}
Description: {description}
Target length: {target_words} words

Requirements:
- Queries must be specific and cover different angles of the section.
- Suitable for both web search and knowledge base retrieval.

Format your response as JSON:
{{
    "queries": ["query 1", "query 2", "query 3"]
}}"#,
    )
}

pub fn section_reflection(name: &str, description: &str, evidence: &str) -> String {
    format!(
        r#"You are checking whether the research gathered for a report section is enough to write it.

Section: {name}
Description: {description}

Format your response as a JSON object with exactly these keys:
- "is_sufficient": true or false
- "knowledge_gap": what is missing ("" when sufficient)
- "follow_up_queries": list of search queries addressing the gap ([] when sufficient)

Research gathered so far:
{evidence}"#,
    )
}

pub fn section_research_draft(
    report_title: &str,
    name: &str,
    description: &str,
    target_words: usize,
    evidence: &str,
    references: &str,
) -> String {
    format!(
        r###"You are a professional report writer. Write one section of the report "{report_title}" from the research below.

Section: {name}
Description: {description}
Target length: about {target_words} words

Requirements:
- Start with the heading "## {name}".
- Use only facts supported by the research; cite them with markers like [1], [2] matching the numbered sources.
- End the section with a "References" list of the sources you cited.
- Write substantive, analytical prose, not an outline.

Numbered sources:
{references}

Research:
{evidence}

Write the section now:"###,
    )
}

pub fn section_direct_draft(
    report_title: &str,
    name: &str,
    description: &str,
    target_words: usize,
    prior_content: Option<&str>,
) -> String {
    let context = match prior_content {
        Some(content) if !content.trim().is_empty() => format!(
            "\nContent of the sections written so far (summarize and draw conclusions from it):\n{}\n",
            content
        ),
        _ => String::new(),
    };
    format!(
        r###"You are a professional report writer. Write one section of the report "{report_title}".

Section: {name}
Description: {description}
Target length: about {target_words} words
{context}
Requirements:
- Start with the heading "## {name}".
- Write substantive, analytical prose, not an outline.

Write the section now:"###,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_writer_embeds_limits() {
        let prompt = query_writer("AI in healthcare", 3);
        assert!(prompt.contains("more than 3 queries"));
        assert!(prompt.contains("Context: AI in healthcare"));
        assert!(prompt.contains("\"query\""));
    }

    #[test]
    fn test_drafts_ask_for_section_heading() {
        let researched =
            section_research_draft("R", "Intro", "scope", 800, "evidence", "[1] https://a.example");
        assert!(researched.contains("\"## Intro\""));
        assert!(researched.contains("[1] https://a.example"));
        assert!(researched.ends_with("Write the section now:"));

        let direct = section_direct_draft("R", "Outlook", "future", 500, None);
        assert!(direct.contains("\"## Outlook\""));
    }

    #[test]
    fn test_direct_draft_context_optional() {
        let with = section_direct_draft("R", "Conclusion", "wrap up", 500, Some("## Intro\nbody"));
        assert!(with.contains("## Intro\nbody"));
        let without = section_direct_draft("R", "Outlook", "future", 500, None);
        assert!(!without.contains("written so far"));
    }

    #[test]
    fn test_report_plan_braces_render() {
        let prompt = report_plan("Quantum networking", 8000);
        assert!(prompt.contains("\"total_word_count_target\": 8000"));
        assert!(prompt.contains("\"sections\": ["));
    }
}
