use crate::infra::{seed_demo_data, InMemoryStore, LocalMediaStore, StaticDirectory};
use chrono::Utc;
use clap::Args;
use std::sync::Arc;

use checkbot::checklists::auth::UserDirectory;
use checkbot::checklists::catalog::CatalogReader;
use checkbot::checklists::conversation::events::{
    AnswerButton, CallbackToken, InboundEvent, ModeChoice, OutboundCommand, PhotoRef, QuestionNav,
};
use checkbot::checklists::domain::{ChecklistId, UserId};
use checkbot::checklists::report::ReportAssembler;
use checkbot::checklists::{ConversationEngine, SessionState};
use checkbot::error::AppError;

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Department label used for the scripted run.
    #[arg(long, default_value = "Bakery")]
    pub(crate) department: String,
}

/// Walks the seeded "Store Safety Audit" end to end and prints every
/// command the transport would perform, finishing with the assembled
/// report totals.
pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let store = Arc::new(InMemoryStore::default());
    seed_demo_data(&store);

    let directory = StaticDirectory::demo();
    let user = directory
        .user(&UserId("u-1".to_string()))
        .ok()
        .flatten()
        .expect("demo user is seeded");

    let engine = ConversationEngine::new(
        store.clone(),
        Arc::new(LocalMediaStore::new("media".to_string())),
    );

    let script: Vec<(&str, InboundEvent)> = vec![
        ("employee says hi", text("hi")),
        (
            "picks the safety audit",
            button(CallbackToken::Checklist(ChecklistId("cl-safety".to_string()))),
        ),
        (
            "selects a department",
            button(CallbackToken::Department(args.department.clone())),
        ),
        (
            "starts step-by-step",
            button(CallbackToken::Mode(ModeChoice::StepByStep)),
        ),
        ("answers yes", button(CallbackToken::Answer(AnswerButton::Yes))),
        (
            "tries to advance without the required photo",
            button(CallbackToken::Nav(QuestionNav::Next)),
        ),
        (
            "sends the photo",
            InboundEvent::Photo {
                photo: PhotoRef("demo-photo-1".to_string()),
            },
        ),
        ("advances", button(CallbackToken::Nav(QuestionNav::Next))),
        (
            "rates cleanliness 4 of 5",
            button(CallbackToken::Answer(AnswerButton::Scale(4))),
        ),
        ("finishes", button(CallbackToken::Nav(QuestionNav::Next))),
    ];

    println!("Checklist bot demo — Store Safety Audit");
    for (description, event) in script {
        println!("\n> {description}");
        let commands = engine.handle(&user, event, Utc::now());
        print_commands(&commands);
    }

    if let SessionState::Completed { attempt, .. } = engine.session(&user.id) {
        let assembler = ReportAssembler::new(CatalogReader::new(store.clone()), store);
        let report = assembler
            .assemble(&attempt)
            .expect("finalized attempt assembles");
        println!("\nReport for {}:", report.checklist_name);
        for row in &report.rows {
            println!(
                "  [{}] {} -> {}",
                row.section,
                row.question,
                row.answer.as_deref().unwrap_or("—")
            );
        }
        if let Some(totals) = report.totals {
            println!(
                "  Total: {:.1} / {:.1} ({:.0}%)",
                totals.score, totals.max_weight, totals.percent
            );
        }
    }

    Ok(())
}

fn text(message: &str) -> InboundEvent {
    InboundEvent::Text {
        text: message.to_string(),
    }
}

fn button(token: CallbackToken) -> InboundEvent {
    InboundEvent::Button {
        token: token.encode(),
    }
}

fn print_commands(commands: &[OutboundCommand]) {
    for command in commands {
        let (text, keyboard) = match command {
            OutboundCommand::Send { text, keyboard } => (text, keyboard),
            OutboundCommand::Edit { text, keyboard, .. } => (text, keyboard),
        };
        for line in text.lines() {
            println!("  bot: {line}");
        }
        if let Some(keyboard) = keyboard {
            for row in &keyboard.rows {
                let labels: Vec<&str> = row.iter().map(|b| b.label.as_str()).collect();
                println!("       [{}]", labels.join(" | "));
            }
        }
    }
}
