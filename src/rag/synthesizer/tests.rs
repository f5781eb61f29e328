use super::*;
use std::sync::Mutex;

struct RecordingGenerator {
    reply: anyhow::Result<String>,
    prompts: Mutex<Vec<(String, String)>>,
}

impl RecordingGenerator {
    fn replying(reply: &str) -> Self {
        Self {
            reply: Ok(reply.to_string()),
            prompts: Mutex::new(Vec::new()),
        }
    }
}

impl Generator for RecordingGenerator {
    fn model_name(&self) -> &str {
        "recording"
    }

    fn generate(&self, system: &str, prompt: &str) -> anyhow::Result<String> {
        self.prompts
            .lock()
            .expect("lock should not be poisoned")
            .push((system.to_string(), prompt.to_string()));
        match &self.reply {
            Ok(reply) => Ok(reply.clone()),
            Err(e) => Err(anyhow::anyhow!("{}", e)),
        }
    }
}

#[test]
fn prompt_contains_chunks_then_question() {
    let prompt = build_prompt(
        "Why do scratches occur?",
        &["defect_description: scratch on surface", "inspection_result: fail"],
    );

    let first = prompt
        .find("scratch on surface")
        .expect("first chunk should be in the prompt");
    let second = prompt
        .find("inspection_result: fail")
        .expect("second chunk should be in the prompt");
    let question = prompt
        .find("Question: Why do scratches occur?")
        .expect("question should be in the prompt");

    assert!(first < second && second < question);
    assert!(prompt.contains("scratch on surface\n\ninspection_result: fail"));
}

#[test]
fn prompt_with_no_context_still_asks_question() {
    let contexts: [&str; 0] = [];
    let prompt = build_prompt("anything?", &contexts);
    assert!(prompt.contains("Question: anything?"));
}

#[test]
fn synthesize_passes_system_instruction_and_trims_answer() {
    let generator = Arc::new(RecordingGenerator::replying("  Handling damage.\n"));
    let synthesizer = AnswerSynthesizer::new(generator.clone());

    let answer = synthesizer
        .synthesize("Why?", &["defect_description: scratch"])
        .expect("generation should succeed");

    assert_eq!(answer, "Handling damage.");
    let prompts = generator.prompts.lock().expect("lock should not be poisoned");
    assert_eq!(prompts.len(), 1);
    assert_eq!(prompts[0].0, SYSTEM_PROMPT);
    assert!(prompts[0].1.contains("defect_description: scratch"));
}

#[test]
fn generator_failure_is_a_generation_error() {
    let generator = Arc::new(RecordingGenerator {
        reply: Err(anyhow::anyhow!("HTTP 500")),
        prompts: Mutex::new(Vec::new()),
    });
    let synthesizer = AnswerSynthesizer::new(generator);

    let result = synthesizer.synthesize("Why?", &["context"]);
    assert!(matches!(result, Err(RagError::Generation(message)) if message.contains("HTTP 500")));
}
