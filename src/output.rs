//! Human-readable rendering of compiled plans.
//!
//! Used by the CLI's `--explain` flag and handy when debugging placement
//! decisions. Output is deterministic: object fields are printed in sorted key
//! order.
//!
//! # Examples
//!
//! ```
//! use clove_match::ast::Expr;
//! use clove_match::compiler::compile;
//! use clove_match::output::explain;
//! use serde_json::json;
//!
//! let def = compile(&Expr::equals(Expr::field(&["name"]), Expr::value(json!("Brett")))).unwrap();
//! let text = explain(&def);
//! assert!(text.contains("\"name\":"));
//! assert!(text.contains("#0 == @ \"Brett\""));
//! ```

use crate::ast::LoopMode;
use crate::bintree::{BinTree, NodeType};
use crate::compiler::{AfterNode, ExecNode, LoopNode, MatchDef, OpNode, Operand};

pub struct PlanPrinter {
    out: String,
}

impl PlanPrinter {
    pub fn new() -> Self {
        PlanPrinter { out: String::new() }
    }

    pub fn print(mut self, def: &MatchDef) -> String {
        self.line(
            0,
            &format!(
                "buckets: {}, slots: {}, expressions: {}",
                def.num_buckets(),
                def.num_slots,
                def.match_buckets.len()
            ),
        );
        self.line(0, "tree:");
        self.print_tree(&def.tree);
        self.line(0, "plan:");
        self.print_node(&def.root, 1);
        self.out
    }

    fn print_tree(&mut self, tree: &BinTree) {
        for (idx, node) in tree.nodes().iter().enumerate() {
            let text = match node.kind {
                NodeType::Leaf => format!("{idx}: leaf"),
                NodeType::Not => format!("{idx}: not {}", node.left),
                NodeType::And => format!("{idx}: and {} {}", node.left, node.right),
                NodeType::Or => format!("{idx}: or {} {}", node.left, node.right),
                NodeType::Barrier if node.right == 0 => format!("{idx}: barrier {}", node.left),
                NodeType::Barrier => format!("{idx}: barrier {} {}", node.left, node.right),
            };
            self.line(1, &text);
        }
    }

    fn print_node(&mut self, node: &ExecNode, indent: usize) {
        if let Some(slot) = node.slot {
            self.line(indent, &format!("capture ${slot}"));
        }
        for op in &node.ops {
            self.print_op(op, indent);
        }
        for lp in &node.loops {
            self.print_loop(lp, indent);
        }

        // Sort keys for deterministic output
        let mut keys: Vec<_> = node.elems.keys().collect();
        keys.sort();
        for key in keys {
            self.line(indent, &format!("\"{}\":", escape_string(key)));
            self.print_node(&node.elems[key], indent + 1);
        }

        if let Some(after) = &node.after {
            self.print_after(after, indent);
        }
    }

    fn print_after(&mut self, after: &AfterNode, indent: usize) {
        if after.is_empty() {
            return;
        }
        self.line(indent, "after:");
        for op in &after.ops {
            self.print_op(op, indent + 1);
        }
        for lp in &after.loops {
            self.print_loop(lp, indent + 1);
        }
    }

    fn print_op(&mut self, op: &OpNode, indent: usize) {
        let mut text = format!("#{} {} {}", op.bucket, op.op.symbol(), render_operand(&op.lhs));
        if let Some(rhs) = &op.rhs {
            text.push(' ');
            text.push_str(&render_operand(rhs));
        }
        if let Some(pattern) = &op.pattern {
            text.push_str(&format!(" /{}/", pattern.as_str()));
        }
        self.line(indent, &text);
    }

    fn print_loop(&mut self, lp: &LoopNode, indent: usize) {
        let mode = match lp.mode {
            LoopMode::Any => "any",
            LoopMode::Every => "every",
            LoopMode::AnyEvery => "any-every",
        };
        let mut text = format!("#{} {mode} in {}", lp.bucket, render_operand(&lp.target));
        if !lp.local_slots.is_empty() {
            let slots: Vec<String> = lp.local_slots.iter().map(|s| format!("${s}")).collect();
            text.push_str(&format!(" (clears {})", slots.join(" ")));
        }
        self.line(indent, &text);
        self.print_node(&lp.node, indent + 1);
    }

    fn line(&mut self, indent: usize, text: &str) {
        self.out.push_str(&"  ".repeat(indent));
        self.out.push_str(text);
        self.out.push('\n');
    }
}

impl Default for PlanPrinter {
    fn default() -> Self {
        Self::new()
    }
}

fn render_operand(operand: &Operand) -> String {
    match operand {
        Operand::Literal(value) => value.to_json().to_string(),
        Operand::Slot(slot) => format!("${slot}"),
        Operand::Active => "@".to_string(),
        Operand::Func(func) => {
            let args: Vec<String> = func.args.iter().map(render_operand).collect();
            format!("{}({})", func.name.name(), args.join(", "))
        }
    }
}

fn escape_string(s: &str) -> String {
    s.chars()
        .flat_map(|c| match c {
            '"' => vec!['\\', '"'],
            '\\' => vec!['\\', '\\'],
            '\n' => vec!['\\', 'n'],
            '\r' => vec!['\\', 'r'],
            '\t' => vec!['\\', 't'],
            c if c.is_control() => format!("\\u{:04x}", c as u32).chars().collect(),
            c => vec![c],
        })
        .collect()
}

/// Renders a compiled plan: its resolution tree, then the execution plan
/// with `@` for the value at the current node and `$n` for slot `n`.
pub fn explain(def: &MatchDef) -> String {
    PlanPrinter::new().print(def)
}
