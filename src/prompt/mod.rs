//! Prompt template store: one instruction template and one system role per stage.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StagePrompt {
    RequirementsReview,
    RequirementsToHld,
    HldToTechnical,
    TechnicalToCode,
}

#[derive(Debug)]
pub struct PromptTemplate {
    pub name: &'static str,
    /// The single `{placeholder}` token substituted into `body`.
    pub placeholder: &'static str,
    pub body: &'static str,
    pub system: &'static str,
}

impl PromptTemplate {
    /// Single-pass substitution, so brace tokens inside `value` stay literal.
    pub fn render(&self, value: &str) -> String {
        let token = format!("{{{}}}", self.placeholder);
        self.body.replace(&token, value)
    }
}

const SYSTEM_REQUIREMENTS: &str =
    "You are a senior business analyst helping to create clear and structured software requirements for embedded systems.";
const SYSTEM_HLD: &str = "You are a senior embedded systems architect creating high-level design documents.";
const SYSTEM_TECHNICAL: &str =
    "You are a technical lead creating detailed technical specifications for embedded systems.";
const SYSTEM_CODE: &str = "You are a senior embedded software developer generating production-ready C++ code.";

const REQUIREMENTS_REVIEW: &str = r#"Review the following draft requirements for an embedded software system and rewrite them as a clear, structured requirements document.

Group them into:
1. Functional Requirements
2. Non-Functional Requirements (timing, memory, power, safety)
3. Hardware Constraints
4. Assumptions and Open Questions

Keep every stated requirement; flag ambiguities instead of guessing.

Draft Requirements:
{requirements}"#;

const REQUIREMENTS_TO_HLD: &str = r#"As a senior embedded systems architect, analyze these requirements and create a comprehensive high-level design for an embedded software system.
Include both textual description and a Graphviz diagram.

For the diagram, use dot notation. Wrap the diagram in ```dot tags.
Example diagram format:
```dot
digraph G {
    A -> B;
    B -> C;
    B -> D;
}
```

Requirements:
{requirements}

Format your response in this order:
1. System Architecture Overview (with Graphviz diagram)
2. Main Components
3. Data Flow
4. Hardware Interfaces
5. Technology Stack
6. Integration Points"#;

const HLD_TO_TECHNICAL: &str = r#"As a technical lead for embedded systems, convert this high-level design into a detailed technical specification.
Include both textual description and a detailed technical diagram using Graphviz.

The diagram should cover component relationships, data flow and hardware interfaces.
Use a single ```dot block for the diagram.

High-Level Design:
{hld}

Format your response with proper technical details, considerations, and the diagram."#;

const TECHNICAL_TO_CODE: &str = r#"As a senior embedded software developer, generate a complete C++ codebase for this technical design.

Return EXACTLY ONE JSON object and nothing else. Each key is a relative file path and each value is the full file content as a string.
The project MUST include:
- src/main.cpp (entry point)
- at least one header under include/ (.h)
- CMakeLists.txt (build script)
- tests for the main components under tests/
- README.md describing how to build and run

Example shape:
{"CMakeLists.txt": "...", "include/app.h": "...", "src/main.cpp": "...", "tests/test_app.cpp": "...", "README.md": "..."}

Technical Design:
{technical_design}"#;

static TEMPLATES: [PromptTemplate; 4] = [
    PromptTemplate {
        name: "requirements_review",
        placeholder: "requirements",
        body: REQUIREMENTS_REVIEW,
        system: SYSTEM_REQUIREMENTS,
    },
    PromptTemplate {
        name: "requirements_to_hld",
        placeholder: "requirements",
        body: REQUIREMENTS_TO_HLD,
        system: SYSTEM_HLD,
    },
    PromptTemplate {
        name: "hld_to_technical",
        placeholder: "hld",
        body: HLD_TO_TECHNICAL,
        system: SYSTEM_TECHNICAL,
    },
    PromptTemplate {
        name: "technical_to_code",
        placeholder: "technical_design",
        body: TECHNICAL_TO_CODE,
        system: SYSTEM_CODE,
    },
];

pub fn template(kind: StagePrompt) -> &'static PromptTemplate {
    match kind {
        StagePrompt::RequirementsReview => &TEMPLATES[0],
        StagePrompt::RequirementsToHld => &TEMPLATES[1],
        StagePrompt::HldToTechnical => &TEMPLATES[2],
        StagePrompt::TechnicalToCode => &TEMPLATES[3],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [StagePrompt; 4] = [
        StagePrompt::RequirementsReview,
        StagePrompt::RequirementsToHld,
        StagePrompt::HldToTechnical,
        StagePrompt::TechnicalToCode,
    ];

    #[test]
    fn every_template_has_its_placeholder_exactly_once() {
        for kind in ALL {
            let t = template(kind);
            let token = format!("{{{}}}", t.placeholder);
            assert_eq!(t.body.matches(&token).count(), 1, "{}", t.name);
            assert!(!t.system.is_empty());
        }
    }

    #[test]
    fn render_substitutes_and_keeps_caller_braces_literal() {
        let out = template(StagePrompt::HldToTechnical).render("uses {requirements} and {hld} verbatim");
        assert!(out.contains("High-Level Design:\nuses {requirements} and {hld} verbatim"));
        assert!(!out.contains("{hld}\n\nFormat"));
    }

    #[test]
    fn hld_prompt_keeps_the_dot_example_braces() {
        let out = template(StagePrompt::RequirementsToHld).render("REQ");
        assert!(out.contains("digraph G {\n    A -> B;"));
        assert!(out.contains("Requirements:\nREQ\n"));
    }
}
