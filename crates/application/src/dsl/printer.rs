//! Canonical source printer
//!
//! Printing a program and parsing the output yields an equal tree.

use domain::{ChaosStatement, Program, Statement};

const INDENT: &str = "    ";

/// Render a program in canonical form
#[must_use]
pub fn print_program(program: &Program) -> String {
    let mut out = String::new();
    for statement in &program.statements {
        print_statement(&mut out, statement, 0);
    }
    out
}

fn line(out: &mut String, depth: usize, text: &str) {
    for _ in 0..depth {
        out.push_str(INDENT);
    }
    out.push_str(text);
    out.push('\n');
}

fn print_statement(out: &mut String, statement: &Statement, depth: usize) {
    match statement {
        Statement::Scenario(scenario) => {
            line(out, depth, &format!("scenario {} {{", scenario.name));
            for chaos in &scenario.statements {
                print_chaos(out, chaos, depth + 1);
            }
            line(out, depth, "}");
        },
        Statement::If(conditional) => {
            line(out, depth, &format!("if ({}) {{", conditional.condition));
            for inner in &conditional.then_branch {
                print_statement(out, inner, depth + 1);
            }
            if let Some(else_branch) = &conditional.else_branch {
                line(out, depth, "} else {");
                for inner in else_branch {
                    print_statement(out, inner, depth + 1);
                }
            }
            line(out, depth, "}");
        },
        Statement::Loop(repeat) => {
            line(
                out,
                depth,
                &format!("for ({} in {}) {{", repeat.variable, repeat.range),
            );
            for inner in &repeat.body {
                print_statement(out, inner, depth + 1);
            }
            line(out, depth, "}");
        },
        Statement::Chaos(chaos) => print_chaos(out, chaos, depth),
    }
}

fn print_chaos(out: &mut String, chaos: &ChaosStatement, depth: usize) {
    match chaos {
        ChaosStatement::Node(node) => {
            line(out, depth, &format!("node {} {{", node.service));
            for action in &node.actions {
                line(out, depth + 1, &action.to_string());
            }
            line(out, depth, "}");
        },
        ChaosStatement::Partition(partition) => {
            let mut text = format!("partition {} from {}", partition.from, partition.to);
            if let Some(duration) = &partition.duration {
                text.push_str(&format!(" duration {duration}"));
            }
            line(out, depth, &text);
        },
        ChaosStatement::Link(link) => {
            line(out, depth, &format!("link {} -> {} {{", link.from, link.to));
            for action in &link.actions {
                line(out, depth + 1, &action.to_string());
            }
            line(out, depth, "}");
        },
    }
}
