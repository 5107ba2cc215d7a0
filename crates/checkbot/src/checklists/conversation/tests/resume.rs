use std::sync::Arc;

use super::common::*;
use crate::checklists::conversation::events::{AnswerButton, CallbackToken, QuestionNav};
use crate::checklists::conversation::SessionState;

#[test]
fn reentering_resumes_at_first_unanswered_question() {
    let store = Arc::new(MemoryStore::default());
    let checklist = seed_walkthrough(&store);

    // first process: answer two of three questions
    {
        let engine = engine(store.clone());
        let user = employee();
        begin_run(&engine, &user, &checklist);
        engine.handle(&user, button(&CallbackToken::Answer(AnswerButton::Yes)), now());
        engine.handle(&user, button(&CallbackToken::Nav(QuestionNav::Next)), now());
        engine.handle(
            &user,
            button(&CallbackToken::Answer(AnswerButton::Scale(4))),
            now(),
        );
    }

    // "restart": a fresh engine over the same storage has no sessions
    let engine = engine(store.clone());
    let user = employee();
    assert_eq!(engine.session(&user.id).label(), "idle");

    let commands = engine.handle(
        &user,
        button(&CallbackToken::Checklist(checklist.clone())),
        now(),
    );
    let output = rendered(&commands);
    assert!(output.contains("Resuming your saved progress"));
    assert!(output.contains("Question 3/3"));
    assert!(output.contains("Answered so far: 2/3"));

    match engine.session(&user.id) {
        SessionState::AnsweringQuestion { index, .. } => assert_eq!(index, 2),
        other => panic!("expected answering state, got {other:?}"),
    }

    // the two prior answers are intact in the draft
    let draft = store.draft_for(&user.id, &checklist).expect("draft survives");
    let answers =
        crate::checklists::storage::DraftRepository::answers(store.as_ref(), &draft.id)
            .expect("answers load");
    let mut values: Vec<Option<&str>> = answers
        .iter()
        .map(|a| a.response_value.as_deref())
        .collect();
    values.sort();
    assert_eq!(values, vec![Some("4"), Some("yes")]);
}

#[test]
fn resume_skips_department_selection() {
    let store = Arc::new(MemoryStore::default());
    let checklist = seed_walkthrough(&store);

    {
        let engine = engine(store.clone());
        let user = employee();
        begin_run(&engine, &user, &checklist);
        engine.handle(&user, button(&CallbackToken::Answer(AnswerButton::Yes)), now());
    }

    let engine = engine(store.clone());
    let user = employee();
    engine.handle(
        &user,
        button(&CallbackToken::Checklist(checklist.clone())),
        now(),
    );
    // straight back into the questions, not the department menu
    assert_eq!(engine.session(&user.id).label(), "answering_question");
}

#[test]
fn discarded_draft_starts_fresh_next_time() {
    let store = Arc::new(MemoryStore::default());
    let checklist = seed_walkthrough(&store);
    let engine = engine(store.clone());
    let user = employee();

    begin_run(&engine, &user, &checklist);
    engine.handle(&user, button(&CallbackToken::Answer(AnswerButton::Yes)), now());
    engine.handle(&user, button(&CallbackToken::Nav(QuestionNav::Discard)), now());
    assert!(store.draft_for(&user.id, &checklist).is_none());

    let commands = engine.handle(
        &user,
        button(&CallbackToken::Checklist(checklist.clone())),
        now(),
    );
    // a brand-new run asks for the department again
    assert!(rendered(&commands).contains("Which department"));
}
