//! Example: Replay a transcript through the pipeline
//!
//! Demonstrates the default configuration with a recording sink, so no
//! program is launched.

use voice_intent::*;

fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    println!("=== Transcript Replay Example ===\n");

    let pipeline = CommandPipeline::new(PipelineConfig::default())?;
    let mut sink = RecordingSink::default();

    let transcript = vec![
        "hello assistant",
        "what time is it",
        "please open notepad now",
        "open youtube or google",
        "open a website",
        "i like pizza",
        "asdkjf qpwoe",
    ];

    for utterance in transcript {
        println!("Input: \"{}\"", utterance);

        let report = pipeline.handle(utterance, &mut sink)?;

        println!("  Intent: {}", report.predicted);
        println!("  Confidence: {:.2}", report.confidence);
        println!("  Outcome: {}", report.kind());
        if let Outcome::Act(invocation) = &report.outcome {
            println!("  Action: {} {:?}", invocation.action, invocation.parameter);
        }
        println!();
    }

    println!(
        "{} actions, {} reports",
        sink.invocations.len(),
        sink.reports.len()
    );

    Ok(())
}
