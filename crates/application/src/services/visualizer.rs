//! Graphviz rendering of a program
//!
//! Scenarios become clusters, node faults become red dashed self-edges,
//! partitions become blue bold edges between the two filters, link faults
//! become green edges, conditionals become diamonds and loops become boxes.

use domain::{ChaosStatement, Program, Statement};

/// Render a program as a DOT digraph
#[must_use]
pub fn render_dot(program: &Program) -> String {
    let mut dot = DotWriter::default();
    dot.line(0, "digraph ChaosScenario {");
    dot.line(1, "rankdir=LR;");
    dot.line(1, "node [shape=ellipse, fontname=\"Helvetica\"];");
    dot.line(1, "edge [fontname=\"Helvetica\", fontsize=10];");
    for statement in &program.statements {
        dot.statement(statement, 1);
    }
    dot.line(0, "}");
    dot.out
}

fn quote(text: &str) -> String {
    format!("\"{}\"", text.replace('\\', "\\\\").replace('"', "\\\""))
}

#[derive(Default)]
struct DotWriter {
    out: String,
    next_id: usize,
}

impl DotWriter {
    fn line(&mut self, depth: usize, text: &str) {
        for _ in 0..depth {
            self.out.push_str("    ");
        }
        self.out.push_str(text);
        self.out.push('\n');
    }

    fn fresh(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{prefix}_{}", self.next_id)
    }

    fn edge(&mut self, depth: usize, from: &str, to: &str, attributes: &str) {
        let text = format!("{} -> {} [{attributes}];", quote(from), quote(to));
        self.line(depth, &text);
    }

    /// Emit a statement, returning the nodes that incoming edges should hit
    fn statement(&mut self, statement: &Statement, depth: usize) -> Vec<String> {
        match statement {
            Statement::Scenario(scenario) => {
                let header = format!("subgraph {} {{", quote(&format!("cluster_{}", scenario.name)));
                self.line(depth, &header);
                self.line(depth + 1, &format!("label={};", quote(&format!("scenario {}", scenario.name))));
                self.line(depth + 1, "style=rounded;");
                let anchors = scenario
                    .statements
                    .iter()
                    .flat_map(|chaos| self.chaos(chaos, depth + 1))
                    .collect();
                self.line(depth, "}");
                anchors
            },
            Statement::If(conditional) => {
                let id = self.fresh("if");
                let declaration = format!(
                    "{} [shape=diamond, label={}];",
                    quote(&id),
                    quote(&conditional.condition.to_string())
                );
                self.line(depth, &declaration);
                for anchor in self.block(&conditional.then_branch, depth) {
                    self.edge(depth, &id, &anchor, "label=\"then\"");
                }
                if let Some(else_branch) = &conditional.else_branch {
                    for anchor in self.block(else_branch, depth) {
                        self.edge(depth, &id, &anchor, "label=\"else\", style=dotted");
                    }
                }
                vec![id]
            },
            Statement::Loop(repeat) => {
                let id = self.fresh("loop");
                let label = format!("for {} in {}", repeat.variable, repeat.range);
                let declaration = format!("{} [shape=box, label={}];", quote(&id), quote(&label));
                self.line(depth, &declaration);
                for anchor in self.block(&repeat.body, depth) {
                    self.edge(depth, &id, &anchor, "label=\"body\"");
                }
                vec![id]
            },
            Statement::Chaos(chaos) => self.chaos(chaos, depth),
        }
    }

    fn block(&mut self, statements: &[Statement], depth: usize) -> Vec<String> {
        statements
            .iter()
            .flat_map(|statement| self.statement(statement, depth))
            .collect()
    }

    fn chaos(&mut self, chaos: &ChaosStatement, depth: usize) -> Vec<String> {
        match chaos {
            ChaosStatement::Node(node) => {
                let label: Vec<String> = node.actions.iter().map(ToString::to_string).collect();
                self.line(depth, &format!("{};", quote(&node.service)));
                let attributes = format!(
                    "label={}, color=red, style=dashed",
                    quote(&label.join("\\n"))
                );
                self.edge(depth, &node.service, &node.service, &attributes);
                vec![node.service.clone()]
            },
            ChaosStatement::Partition(partition) => {
                let from = partition.from.to_string();
                let to = partition.to.to_string();
                for side in [&from, &to] {
                    self.line(depth, &format!("{} [shape=box];", quote(side)));
                }
                let label = partition
                    .duration
                    .as_ref()
                    .map_or_else(|| "partition".to_string(), |d| format!("partition {d}"));
                let attributes = format!("label={}, color=blue, style=bold, dir=both", quote(&label));
                self.edge(depth, &from, &to, &attributes);
                vec![from]
            },
            ChaosStatement::Link(link) => {
                let label: Vec<String> = link.actions.iter().map(ToString::to_string).collect();
                let attributes = format!("label={}, color=green", quote(&label.join("\\n")));
                self.edge(depth, &link.from, &link.to, &attributes);
                vec![link.from.clone()]
            },
        }
    }
}
