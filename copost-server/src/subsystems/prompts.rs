//! Prompt assembly. Pure string building, no IO.

use copost_core::models::{ContentTemplate, Idea, RetrievalResult, ScheduleEvent, Tweet};

pub const CONTENT_SYSTEM: &str = "You write co-marketing content for cross-posting campaigns. \
You write as our company, the publisher of the self context, and highlight the collaboration \
with the partner named in the event. Keep the tone consistent with both brands and make the \
piece engaging, relevant and original.";

pub const ANALYSIS_SYSTEM: &str = "You analyse social media activity. Read the partner's recent \
posts and the extra context, then summarise the key themes, notable events and upcoming dates, \
with supporting detail for each.";

pub const IDEAS_SYSTEM: &str = "You propose content ideas for a co-marketing post. Use the \
context analysis, the available templates and what we know about our own company. Each idea has \
a title, the title of one template, a topic, a short creative brief, and a relevance score \
between 0 and 1 for how well it fits the partner's recent activity and the extra context. \
Respond with a JSON object of the form \
{\"ideas\": [{\"title\": string, \"template\": string, \"topic\": string, \"relevance\": number, \"brief\": string}]}.";

pub const REFINE_SYSTEM: &str = "You sharpen a single content idea. Keep its template unless \
another clearly fits better, tighten the brief, re-score relevance between 0 and 1, and list a \
few concrete suggestions for the writer. Respond with a JSON object of the form \
{\"title\": string, \"template\": string, \"topic\": string, \"relevance\": number, \"brief\": string, \"additional_suggestions\": [string]}.";

pub const ASSUMPTIONS_SYSTEM: &str = "You answer questions about a company using only the \
provided context. Respond with a JSON object of the form {\"assumptions\": [string]}.";

/// Query used to pull partner context for assumption generation.
pub const ASSUMPTIONS_QUERY: &str = "Generate a list of assumptions about the partner";

const NO_SELF_CONTEXT: &str = "No self context available.";
const NO_PARTNER_CONTEXT: &str = "No partner documents available.";
const NO_ACTIVITY: &str = "No recent activity provided.";
const NO_USER_CONTEXT: &str = "No additional context provided.";
const NO_IDEA: &str = "No specific idea provided.";

/// `File: <label>\nContent: <text>` blocks separated by blank lines.
pub fn format_context(results: &[RetrievalResult]) -> String {
    results
        .iter()
        .map(|r| format!("File: {}\nContent: {}", r.label, r.content))
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// One line per tweet, newest first as given.
pub fn format_activity(tweets: &[Tweet]) -> String {
    tweets
        .iter()
        .map(|t| format!("- {}: {}", t.label(), t.content))
        .collect::<Vec<_>>()
        .join("\n")
}

fn or_default<'a>(value: Option<&'a str>, fallback: &'a str) -> &'a str {
    match value {
        Some(v) if !v.trim().is_empty() => v,
        _ => fallback,
    }
}

fn non_empty(value: String, fallback: &str) -> String {
    if value.trim().is_empty() {
        fallback.to_string()
    } else {
        value
    }
}

fn format_idea(idea: &Idea) -> String {
    format!(
        "{} ({}): {}\nTemplate: {}",
        idea.title, idea.topic, idea.brief, idea.template
    )
}

pub struct ContentPrompt<'a> {
    pub event: &'a ScheduleEvent,
    pub template: &'a ContentTemplate,
    pub self_context: &'a [RetrievalResult],
    pub partner_context: &'a [RetrievalResult],
    pub activity: Option<&'a str>,
    pub user_context: Option<&'a str>,
    pub idea: Option<&'a Idea>,
    pub word_count: u32,
}

pub fn content_prompt(p: &ContentPrompt<'_>) -> String {
    let event = p.event;
    let partner = &event.partner;
    let assumptions = partner
        .assumptions
        .iter()
        .map(|a| format!("- {}", a.text))
        .collect::<Vec<_>>()
        .join("\n");
    let idea = p.idea.map(format_idea);

    format!(
        "Write {content_type} content for a co-marketing post from our company's perspective, \
featuring our partner \"{partner}\".

## Our company
{self_context}

## Partner
Name: {partner}
{assumptions}

## Partner documents
{partner_context}

## Event
Content type: {content_type}
Time slot: {slot}
Date: {date}

## Partner's recent activity
{activity}

## User context
{user_context}

## Content idea
{idea}

## Template
{template}

## Instructions
- Promote both companies and make the collaboration and its mutual benefit clear.
- Keep a tone that fits both brands.
- The piece must work when cross-posted on either company's channels.
- Aim for about {words} words.
- Format it for the content type.",
        content_type = event.content_type,
        partner = partner.name,
        self_context = non_empty(format_context(p.self_context), NO_SELF_CONTEXT),
        assumptions = assumptions,
        partner_context = non_empty(format_context(p.partner_context), NO_PARTNER_CONTEXT),
        slot = event.time_slot,
        date = event.date.format("%A %B %-d, %Y"),
        activity = or_default(p.activity, NO_ACTIVITY),
        user_context = or_default(p.user_context, NO_USER_CONTEXT),
        idea = idea.as_deref().unwrap_or(NO_IDEA),
        template = p.template.content,
        words = p.word_count,
    )
}

/// Second pass: critique the draft against the same self context and return a better version.
pub fn reflection_prompt(
    event: &ScheduleEvent,
    draft: &str,
    self_context: &[RetrievalResult],
    word_count: u32,
) -> String {
    format!(
        "Review this {content_type} draft for a co-marketing post between our company and \"{partner}\".

## Our company
{self_context}

## Draft
{draft}

## Instructions
- Check coherence, tone and fit with both brands.
- Make sure the collaboration and its mutual benefit stand out.
- Improve engagement and relevance where you can.
- Keep it suitable for cross-posting on both companies' channels.
- Keep it to about {words} words.

Reply with the improved content only.",
        content_type = event.content_type,
        partner = event.partner.name,
        self_context = non_empty(format_context(self_context), NO_SELF_CONTEXT),
        draft = draft,
        words = word_count,
    )
}

pub fn analysis_prompt(activity: Option<&str>, user_context: Option<&str>) -> String {
    format!(
        "Recent posts:\n{}\n\nAdditional context:\n{}",
        or_default(activity, NO_ACTIVITY),
        or_default(user_context, NO_USER_CONTEXT)
    )
}

pub fn ideas_prompt(
    event: &ScheduleEvent,
    template_titles: &[&str],
    analysis: &str,
    self_context: &[RetrievalResult],
    user_context: Option<&str>,
) -> String {
    format!(
        "Templates: {templates}\nPartner: {partner}\nContent type: {content_type}\n\n\
Context analysis:\n{analysis}\n\nAbout our company:\n{self_context}\n\nAdditional context:\n{user_context}",
        templates = template_titles.join(", "),
        partner = event.partner.name,
        content_type = event.content_type,
        analysis = analysis,
        self_context = non_empty(format_context(self_context), NO_SELF_CONTEXT),
        user_context = or_default(user_context, NO_USER_CONTEXT),
    )
}

pub fn refine_prompt(event: &ScheduleEvent, idea: &Idea, context: Option<&str>) -> String {
    let idea_json = serde_json::to_string_pretty(idea).unwrap_or_default();
    format!(
        "Partner: {}\nContent type: {}\n\nIdea:\n{}\n\nFeedback and context:\n{}",
        event.partner.name,
        event.content_type,
        idea_json,
        or_default(context, NO_USER_CONTEXT)
    )
}

pub fn assumptions_prompt(partner_name: &str, results: &[RetrievalResult]) -> String {
    format!(
        "Context about {partner}:\n{context}\n\nQuery: {query}\n\
Give short, concrete statements about {partner}'s audience, positioning and priorities.",
        partner = partner_name,
        context = format_context(results),
        query = ASSUMPTIONS_QUERY,
    )
}
