//! Human-readable rendering of plans and run reports

use std::fmt::Write as _;

use application::{ChainStatus, DirectiveRecord, RunReport, ScenarioReport};
use domain::{Directive, DirectiveChain, ExecutionPlan};

/// Render an execution plan as an indented outline
pub fn plan(plan: &ExecutionPlan) -> String {
    let mut out = String::new();
    for run in &plan.runs {
        let kind = if run.declared { "scenario" } else { "implicit" };
        let _ = writeln!(out, "run {} ({kind}, {} chain(s))", run.name, run.chains.len());
        for chain in &run.chains {
            write_chain(&mut out, chain, 1);
        }
    }
    out
}

fn indent(out: &mut String, depth: usize) {
    for _ in 0..depth {
        out.push_str("  ");
    }
}

fn write_chain(out: &mut String, chain: &DirectiveChain, depth: usize) {
    indent(out, depth);
    let _ = writeln!(out, "chain {} [{}]", chain.id, chain.label);
    write_steps(out, &chain.steps, depth + 1);
}

fn write_steps(out: &mut String, steps: &[Directive], depth: usize) {
    for step in steps {
        indent(out, depth);
        match step {
            Directive::Fault(fault) => {
                let _ = writeln!(out, "{fault}");
            },
            Directive::Guard(guard) => {
                let _ = writeln!(out, "if {}", guard.condition);
                write_steps(out, &guard.then_branch, depth + 1);
                if let Some(else_branch) = &guard.else_branch {
                    indent(out, depth);
                    out.push_str("else\n");
                    write_steps(out, else_branch, depth + 1);
                }
            },
            Directive::Fork(fork) => {
                let _ = writeln!(out, "fork scenario {}", fork.scenario);
                for chain in &fork.chains {
                    write_chain(out, chain, depth + 1);
                }
            },
        }
    }
}

/// Render a run report for a terminal
pub fn report(report: &RunReport) -> String {
    let mut out = String::new();
    for scenario in &report.scenarios {
        write_scenario(&mut out, scenario);
    }

    if !report.not_started.is_empty() {
        let _ = writeln!(out, "not started: {}", report.not_started.join(", "));
    }

    let leaked: Vec<&DirectiveRecord> = report
        .scenarios
        .iter()
        .flat_map(ScenarioReport::leaked)
        .collect();
    if !leaked.is_empty() {
        let _ = writeln!(out, "WARNING: {} fault(s) may still be live:", leaked.len());
        for record in leaked {
            let _ = writeln!(out, "  {} on [{}]", record.description, record.targets.join(", "));
        }
    }

    let _ = writeln!(
        out,
        "handles created: {}, revert attempts: {}",
        report.handles_created(),
        report.revert_attempts()
    );
    let _ = write!(out, "status: {}", report.status.as_str());
    if report.cancelled {
        out.push_str(" (cancelled)");
    }
    out.push('\n');
    out
}

fn write_scenario(out: &mut String, scenario: &ScenarioReport) {
    let _ = write!(
        out,
        "{} {}: {} in {} ms",
        if scenario.declared { "scenario" } else { "run" },
        scenario.name,
        scenario.status.as_str(),
        scenario.elapsed_ms
    );
    if scenario.cancelled {
        out.push_str(" (cancelled)");
    }
    out.push('\n');

    for chain in &scenario.chains {
        let status = match chain.status {
            ChainStatus::Completed => "completed",
            ChainStatus::Aborted => "aborted",
            ChainStatus::Lost => "lost",
            ChainStatus::Cancelled => "cancelled",
        };
        let _ = write!(out, "  chain {} [{}] {status}", chain.id, chain.label);
        if let Some(error) = &chain.error {
            let _ = write!(out, ": {error}");
        }
        out.push('\n');
        for record in &chain.records {
            write_record(out, record);
        }
    }
}

fn write_record(out: &mut String, record: &DirectiveRecord) {
    let _ = write!(out, "    {:<24} {}", record.status.as_str(), record.description);
    if !record.targets.is_empty() {
        let _ = write!(out, " [{}]", record.targets.join(", "));
    }
    match (record.applied_at_ms, record.reverted_at_ms) {
        (Some(applied), Some(reverted)) => {
            let _ = write!(out, " +{applied}ms..+{reverted}ms");
        },
        (Some(applied), None) => {
            let _ = write!(out, " +{applied}ms");
        },
        _ => {},
    }
    if let Some(detail) = &record.detail {
        let _ = write!(out, " ({detail})");
    }
    out.push('\n');
}
