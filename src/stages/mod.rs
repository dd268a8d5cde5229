use crate::completion::{Completion, CompletionClient};
use crate::prompt::{template, StagePrompt};

/// The template name doubles as the transcript stage key.
async fn run(client: &CompletionClient, kind: StagePrompt, input: &str) -> Completion {
    let t = template(kind);
    client.complete(t.name, &t.render(input), t.system).await
}

pub async fn review_requirements(client: &CompletionClient, requirements: &str) -> Completion {
    run(client, StagePrompt::RequirementsReview, requirements).await
}

pub async fn generate_hld(client: &CompletionClient, requirements: &str) -> Completion {
    run(client, StagePrompt::RequirementsToHld, requirements).await
}

pub async fn generate_technical_design(client: &CompletionClient, hld: &str) -> Completion {
    run(client, StagePrompt::HldToTechnical, hld).await
}

pub async fn generate_code_structure(client: &CompletionClient, technical_design: &str) -> Completion {
    run(client, StagePrompt::TechnicalToCode, technical_design).await
}
