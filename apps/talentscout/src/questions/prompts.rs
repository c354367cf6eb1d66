// LLM prompt templates for question generation and answer scoring.
// Shared fragments come from llm_client::prompts.

/// Question generation prompt.
/// Replace: {technology}, {easy}, {medium}, {hard}, {total}, {max_chars}
pub const GENERATION_PROMPT_TEMPLATE: &str = r#"You are a senior technical interviewer preparing a screening interview.

Write technical screening questions about: {technology}

Produce EXACTLY {total} questions:
- {easy} with difficulty "easy"
- {medium} with difficulty "medium"
- {hard} with difficulty "hard"

Return a JSON object with this EXACT schema (no extra fields):
{
  "questions": [
    {"difficulty": "easy", "text": "What is ...?"}
  ]
}

HARD RULES:
1. `difficulty` must be one of "easy", "medium", "hard"
2. `text` is a single question, at most {max_chars} characters
3. No two questions may be the same
4. Practical, clearly worded questions only. No trick questions
5. Every question must be about {technology}"#;

/// Answer scoring prompt.
/// Replace: {untrusted_instruction}, {technology}, {difficulty}, {years}, {question}, {answer}
pub const SCORING_PROMPT_TEMPLATE: &str = r#"You are an expert technical interviewer scoring a screening answer.

Technology: {technology}
Difficulty: {difficulty}
Candidate experience: {years} years

QUESTION:
{question}

{untrusted_instruction}

CANDIDATE ANSWER:
{answer}

Score the answer from 0 to 10 weighing technical accuracy (30%), completeness (25%),
clarity (20%), practical understanding (15%) and use of examples (10%).
Adjust expectations to the difficulty and the candidate's experience.

Return a JSON object with this EXACT schema:
{
  "score": 7,
  "reasoning": "One or two sentences.",
  "strengths": ["..."],
  "improvements": ["..."]
}"#;
