//! Session summaries: project overview, errors, dependencies, plan and undo.

use std::collections::BTreeMap;

use crate::shell::result::CommandResult;
use crate::store::{FileStore, TaskStatus};

use super::{CommandOutcome, Output};

pub(super) fn project(store: &FileStore) -> CommandOutcome {
    let mut output = Output::default();

    let mut by_language: BTreeMap<&str, usize> = BTreeMap::new();
    let mut total_size = 0;
    for file in store.files() {
        *by_language.entry(file.language.as_str()).or_default() += 1;
        total_size += file.size();
    }
    output.line(format!("Files: {} ({} bytes)", store.len(), total_size));
    if !by_language.is_empty() {
        let breakdown: Vec<String> = by_language
            .iter()
            .map(|(language, count)| format!("{language}: {count}"))
            .collect();
        output.line(format!("  {}", breakdown.join(", ")));
    }

    let deps = store.dependencies();
    output.line(format!("Dependencies: {}", deps.len()));
    output.line(format!("Errors: {}", store.errors().len()));
    match store.plan() {
        Some(plan) => output.line(format!(
            "Plan: {}/{} tasks completed",
            plan.completed(),
            plan.tasks.len()
        )),
        None => output.line("Plan: none"),
    }
    output.finish()
}

pub(super) fn errors(args: &[String], store: &mut FileStore) -> CommandOutcome {
    match args.first().map(String::as_str) {
        Some("clear") => {
            let count = store.errors().len();
            store.clear_errors();
            Ok(CommandResult::ok(format!("Cleared {count} errors")))
        }
        Some(other) => Ok(CommandResult::failure(format!(
            "errors: unknown argument '{other}'"
        ))),
        None if store.errors().is_empty() => Ok(CommandResult::ok("No errors")),
        None => {
            let mut output = Output::default();
            for (i, error) in store.errors().iter().enumerate() {
                output.line(format!("{}. {}", i + 1, error));
            }
            output.finish()
        }
    }
}

pub(super) fn deps(store: &FileStore) -> CommandOutcome {
    let deps = store.dependencies();
    if deps.is_empty() {
        return Ok(CommandResult::ok("No dependencies"));
    }
    let mut output = Output::default();
    for (name, version) in deps {
        output.line(format!("{name}@{version}"));
    }
    output.finish()
}

pub(super) fn plan(args: &[String], store: &mut FileStore) -> CommandOutcome {
    let Some((action, rest)) = args.split_first() else {
        return Ok(match store.plan() {
            Some(plan) => CommandResult::ok(plan.render()),
            None => CommandResult::ok("No plan set"),
        });
    };

    let status = match action.as_str() {
        "start" => TaskStatus::InProgress,
        "done" => TaskStatus::Completed,
        "reset" => TaskStatus::Pending,
        other => {
            return Ok(CommandResult::failure(format!(
                "plan: unknown action '{other}'"
            )));
        }
    };
    let Some(id) = rest.first() else {
        return Ok(CommandResult::failure(format!(
            "plan: {action}: missing task id"
        )));
    };

    match store.update_task_status(id, status) {
        Ok(()) => Ok(CommandResult::ok(format!("Task {id}: {status}"))),
        Err(e) => Ok(CommandResult::failure(format!("plan: {e}"))),
    }
}

pub(super) fn undo(store: &mut FileStore) -> CommandOutcome {
    if store.rollback() {
        Ok(CommandResult::ok("Reverted the last change"))
    } else {
        Ok(CommandResult::failure("undo: nothing to undo"))
    }
}
