// src/core/prompts.rs — Prompt selection and rendering (minijinja)
//
// Selection is a pure function of (stage, strategy, task, feedback kind).
// Rendering fills the chosen template with problem data.

use minijinja::{context, AutoEscape, Environment};

use super::types::{Stage, Strategy, Task};
use crate::infra::errors::SelfEvolveError;
use crate::provider::Message;

const CODER_SYSTEM: &str = "You are an expert Python programmer who specializes in data-science \
libraries. You read problem statements carefully, respect the surrounding code exactly as given, \
and answer with code that runs without modification. When shown a previous attempt and the \
feedback it received, you find the root cause and fix it rather than patching symptoms.";

const GUIDE_SYSTEM: &str = "You are a programming mentor. You do not write the solution yourself. \
You study the problem, any reference material, and any earlier attempt with its feedback, then \
write a short numbered plan that lets another programmer reach a correct solution on their own.";

const CODE_BASE: &str = r#"Solve the following problem by writing the code that belongs in the `[insert]` slot of the context below.

Problem:
{{ problem }}

Code context:
```python
{{ code_context }}
```

The context shows which libraries are already imported, what the inputs and outputs look like, and how your code will be tested. Do not add imports that the context does not already provide. Answer with one ```python fenced block containing only the code for the `[insert]` slot.
"#;

const CODE_WITH_HINT: &str = r#"{% include "code_base" %}
Follow this step-by-step plan while you reason about the solution:
{{ hint }}
"#;

const FIX_TRACEBACK: &str = r#"{% include "code_base" %}
Your previous attempt was:
```python
{{ generated_code }}
```

Running it raised an error:
```
{{ feedback }}
```

Work out what caused the error and return a corrected version.
"#;

const FIX_MISMATCH: &str = r#"{% include "code_base" %}
Your previous attempt was:
```python
{{ generated_code }}
```

It ran to completion but produced the wrong result:
```
{{ feedback }}
```

Compare the expected and actual output to find the mistake. Work with the inputs the context provides instead of inventing your own sample data.
"#;

const FIX_INSTRUCTION: &str = r#"{% include "code_base" %}
Your previous attempt was:
```python
{{ generated_code }}
```

The test harness responded with this instruction:
```
{{ feedback }}
```

Follow the instruction and answer again.
"#;

const HINT_INITIAL: &str = r#"Another programmer has to solve the problem below. Write a numbered, step-by-step plan that guides them to a solution without giving the final code.

Problem:
{{ problem }}

A related Q&A post that may help:
{{ post }}

Use the post only where it applies. Format the plan as:
1. First, ...
2. Then, ...
3. Finally, ...
"#;

const HINT_CORRECTION: &str = r#"Another programmer tried to solve the problem below and failed. Write a numbered, step-by-step plan that helps them fix their attempt without giving the final code.

Problem:
{{ problem }}

Their attempt:
```python
{{ generated_code }}
```

Feedback from the test harness:
```
{{ feedback }}
```

In your plan, restate what the problem requires, point out where the attempt departs from it, and explain what the feedback reveals about the failure.
"#;

const TEMPLATES: [(&str, &str); 7] = [
    ("code_base", CODE_BASE),
    ("code_with_hint", CODE_WITH_HINT),
    ("fix_traceback", FIX_TRACEBACK),
    ("fix_mismatch", FIX_MISMATCH),
    ("fix_instruction", FIX_INSTRUCTION),
    ("hint_initial", HINT_INITIAL),
    ("hint_correction", HINT_CORRECTION),
];

/// Shape of harness feedback, used to pick the correction prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedbackKind {
    /// The code raised; feedback carries a traceback.
    Traceback,
    /// The code ran but its output differed from the expected one.
    Mismatch,
    /// Anything else, treated as an instruction to comply with.
    Instruction,
}

impl FeedbackKind {
    pub fn classify(feedback: &str) -> Self {
        let lower = feedback.to_lowercase();
        if lower.contains("traceback") {
            FeedbackKind::Traceback
        } else if lower.contains("executed") && lower.contains("expected") {
            FeedbackKind::Mismatch
        } else {
            FeedbackKind::Instruction
        }
    }
}

/// A selected system text plus the name of the human template to render.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PromptTemplate {
    pub system: &'static str,
    pub human: &'static str,
}

/// Values substituted into a human template. Unused fields render nowhere.
#[derive(Debug, Clone, Default)]
pub struct PromptVars<'a> {
    pub problem: &'a str,
    pub code_context: &'a str,
    pub post: &'a str,
    pub generated_code: &'a str,
    pub feedback: &'a str,
    pub hint: &'a str,
}

pub struct PromptBuilder {
    env: Environment<'static>,
}

impl PromptBuilder {
    pub fn new() -> Result<Self, SelfEvolveError> {
        let mut env = Environment::new();
        env.set_auto_escape_callback(|_| AutoEscape::None);
        for (name, source) in TEMPLATES {
            env.add_template(name, source)?;
        }
        Ok(Self { env })
    }

    /// Choose the prompt for a request.
    ///
    /// A zero-shot strategy never issues a hint request, so asking for one is
    /// a configuration error.
    pub fn build(
        &self,
        stage: Stage,
        strategy: Strategy,
        task: Task,
        feedback: Option<&str>,
    ) -> Result<PromptTemplate, SelfEvolveError> {
        let template = match (stage, strategy, task) {
            (_, Strategy::ZeroShot, Task::CotGeneration) => {
                return Err(SelfEvolveError::Config(format!(
                    "hint generation requested with the zeroshot strategy at the {} stage",
                    stage
                )));
            }
            (Stage::Initial, Strategy::ChainOfThought, Task::CotGeneration) => PromptTemplate {
                system: GUIDE_SYSTEM,
                human: "hint_initial",
            },
            (Stage::Correction, Strategy::ChainOfThought, Task::CotGeneration) => {
                PromptTemplate {
                    system: GUIDE_SYSTEM,
                    human: "hint_correction",
                }
            }
            (_, Strategy::ChainOfThought, Task::CodeGeneration) => PromptTemplate {
                system: CODER_SYSTEM,
                human: "code_with_hint",
            },
            (Stage::Initial, Strategy::ZeroShot, Task::CodeGeneration) => PromptTemplate {
                system: CODER_SYSTEM,
                human: "code_base",
            },
            (Stage::Correction, Strategy::ZeroShot, Task::CodeGeneration) => {
                let human = match FeedbackKind::classify(feedback.unwrap_or("")) {
                    FeedbackKind::Traceback => "fix_traceback",
                    FeedbackKind::Mismatch => "fix_mismatch",
                    FeedbackKind::Instruction => "fix_instruction",
                };
                PromptTemplate {
                    system: CODER_SYSTEM,
                    human,
                }
            }
        };
        Ok(template)
    }

    /// Render a template into the system + user message pair sent to the model.
    pub fn render(
        &self,
        template: &PromptTemplate,
        vars: &PromptVars<'_>,
    ) -> Result<Vec<Message>, SelfEvolveError> {
        let human = self.env.get_template(template.human)?.render(context! {
            problem => vars.problem,
            code_context => vars.code_context,
            post => vars.post,
            generated_code => vars.generated_code,
            feedback => vars.feedback,
            hint => vars.hint,
        })?;
        Ok(vec![Message::system(template.system), Message::user(human)])
    }
}
