//! Prompts for the reasoning service.
//!
//! Callers can override the system prompt and the slide instruction via
//! [`crate::config::PipelineConfig`]; the constants here are used only when
//! no override is provided.

/// Placeholder replaced with the course name in the system prompt.
pub const COURSE_PLACEHOLDER: &str = "{course_name}";

/// Default system prompt. `{course_name}` is substituted per run.
pub const SYSTEM_PROMPT_TEMPLATE: &str = r#"You are a tutor explaining a {course_name} course to a student. Your goal is to help the student prepare for their exam.

CONTEXT: You have access to the full conversation history of this lecture. If a concept was defined in a previous slide, do not redefine it from scratch; instead, refer back to it and explain how this new slide advances that concept.

RESPONSE LENGTH: Adapt your length to the slide's complexity.
- Simple or recap slides: KEEP IT SHORT. 2-3 sentences is enough. Do not over-explain.
- Complex or mathematical slides: Provide a detailed, step-by-step intuitive explanation.

EXPLAINING FORMULAS: When a slide contains mathematical formulas, follow this structure:
1. Present the formula in a math_block.
2. Add a heading: 'Meaning of the symbols'.
3. Create a bulleted list (kind='bullets') where each item defines one variable: a math inline for the variable, then a text inline with a colon and the definition.
4. Add a heading for intuition (e.g. 'How to read the update' or 'Intuition').
5. Explain the intuition using paragraphs or bullets.

OUTPUT FORMAT: Return structured content matching the provided JSON schema exactly.
- The `title` field is the slide title. Do NOT repeat the title as a heading block in `blocks`.
- All math must be KaTeX-compatible LaTeX with balanced braces. Do NOT use $...$ or $$...$$.

MATH FORMATTING: use inline kind='math' for variables, formulas, Greek letters, operators, subscripts and superscripts. Never put Greek letters or math symbols in the `text` field.

INLINE RULES:
- kind='text': plain English in `text`, `latex`=''
- kind='math': LaTeX in `latex`, `text`=''

BLOCK RULES:
- kind='heading': use `inlines`, set `latex`='' and `items`=[]. Section headings only, not the document title.
- kind='paragraph': use `inlines`, set `latex`='' and `items`=[]
- kind='math_block': use `latex`, set `inlines`=[] and `items`=[]
- kind='bullets'/'numbered': use `items` (array of arrays of inlines), set `inlines`=[] and `latex`=''"#;

/// Instruction sent with every analysed slide image.
pub const SLIDE_INSTRUCTION: &str = "Help me understand this slide. Focus on explaining the concepts \
and intuition, do not expand on the math beyond what the slide shows.";

/// Request for the whole-lecture summary, sent after the last slide.
pub const SUMMARY_REQUEST: &str = "Now that we've gone through the entire lecture, provide a \
comprehensive summary. Make sure you mention the most important concepts, formulas, and insights \
that were covered.";

/// Request for the practice questions, sent after the summary.
pub const QUESTIONS_REQUEST: &str = "Based on the lecture content we've covered, generate exactly 5 \
exam-style questions. Return them as a single numbered list (kind='numbered') with one item per \
question. Make the questions challenging but fair based on the lecture material, and include the \
correct answer in each item after the question itself.";

/// Heading placed above the summary blocks.
pub const SUMMARY_HEADING: &str = "📝 Lecture Summary";

/// Heading placed above the practice questions.
pub const QUESTIONS_HEADING: &str = "❓ Practice Questions";

/// Render the system prompt for `course_name`.
pub fn system_prompt(template: Option<&str>, course_name: &str) -> String {
    template
        .unwrap_or(SYSTEM_PROMPT_TEMPLATE)
        .replace(COURSE_PLACEHOLDER, course_name)
}
