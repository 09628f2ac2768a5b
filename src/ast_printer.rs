//! AST dump backing `--dump-ast`.
//!
//! A minimal pretty-printer in the style of the teacher's own `Display`
//! impls for its scene-graph nodes (`examples/emdash-udashboard/src/data.rs`):
//! one `fmt::Write` pass per node kind, indentation driven by the CLI's
//! formatter flags (`--use-tabs`/`--tab-size`/`--brace-next-line`) rather
//! than a fixed style, since a full source formatter is out of scope and
//! this is the only place those flags are read.

use std::fmt::Write;

use crate::ast::*;
use crate::cli::CliConfig;

pub struct AstPrinter<'a> {
    ast: &'a Ast,
    indent_unit: String,
    brace_next_line: bool,
    collapse_single_line_block: bool,
    depth: usize,
    out: String,
}

impl<'a> AstPrinter<'a> {
    pub fn new(ast: &'a Ast, cli: &CliConfig) -> AstPrinter<'a> {
        let indent_unit = if cli.use_tabs { "\t".to_string() } else { " ".repeat(cli.tab_size) };
        AstPrinter {
            ast,
            indent_unit,
            brace_next_line: cli.brace_next_line,
            collapse_single_line_block: cli.collapse_single_line_block,
            depth: 0,
            out: String::new(),
        }
    }

    pub fn print_module(mut self, module_name: &str, top_level: &[StmtId]) -> String {
        let _ = writeln!(self.out, "module {}", module_name);
        for &stmt in top_level {
            self.print_stmt(stmt);
        }
        self.out
    }

    fn indent(&mut self) {
        for _ in 0..self.depth {
            self.out.push_str(&self.indent_unit);
        }
    }

    fn brace_open(&mut self, header: &str) {
        self.indent();
        if self.brace_next_line {
            let _ = writeln!(self.out, "{}", header);
            self.indent();
            let _ = writeln!(self.out, "{{");
        } else {
            let _ = writeln!(self.out, "{} {{", header);
        }
    }

    fn brace_close(&mut self) {
        self.indent();
        let _ = writeln!(self.out, "}}");
    }

    fn print_block(&mut self, id: StmtId) {
        let StmtKind::Block(stmts) = &self.ast.stmt(id).kind else {
            self.print_stmt(id);
            return;
        };
        if self.collapse_single_line_block && stmts.len() == 1 {
            let inner = self.describe_stmt(stmts[0]);
            self.indent();
            let _ = writeln!(self.out, "{{ {} }}", inner);
            return;
        }
        self.indent();
        let _ = writeln!(self.out, "{{");
        self.depth += 1;
        for &s in stmts {
            self.print_stmt(s);
        }
        self.depth -= 1;
        self.brace_close();
    }

    fn describe_stmt(&self, id: StmtId) -> String {
        match &self.ast.stmt(id).kind {
            StmtKind::Expression(e) => format!("{};", self.describe_expr(*e)),
            StmtKind::Return { value: Some(e) } => format!("return {};", self.describe_expr(*e)),
            StmtKind::Return { value: None } => "return;".to_string(),
            StmtKind::Break => "break;".to_string(),
            StmtKind::Continue => "continue;".to_string(),
            other => format!("{:?}", other),
        }
    }

    fn describe_expr(&self, id: ExprId) -> String {
        match &self.ast.expr(id).kind {
            ExprKind::Literal(Literal::Int(n)) => n.to_string(),
            ExprKind::Literal(Literal::Float(n)) => n.to_string(),
            ExprKind::Literal(Literal::Str(s)) => format!("{:?}", s),
            ExprKind::Literal(Literal::Bool(b)) => b.to_string(),
            ExprKind::Literal(Literal::Null) => "null".to_string(),
            ExprKind::Variable { name } => name.clone(),
            ExprKind::This => "this".to_string(),
            ExprKind::Call { callee, args } => {
                format!("{}({})", self.describe_expr(*callee), args.iter().map(|a| self.describe_expr(*a)).collect::<Vec<_>>().join(", "))
            }
            ExprKind::Binary { op, left, right } => {
                format!("({} {:?} {})", self.describe_expr(*left), op, self.describe_expr(*right))
            }
            ExprKind::Get { object, name } => format!("{}.{}", self.describe_expr(*object), name),
            other => format!("{:?}", other),
        }
    }

    fn print_stmt(&mut self, id: StmtId) {
        let kind = &self.ast.stmt(id).kind;
        match kind {
            StmtKind::Block(_) => self.print_block(id),
            StmtKind::Var { name, is_ref, initializer, .. } => {
                self.indent();
                let prefix = if *is_ref { "ref" } else { "var" };
                match initializer {
                    Some(e) => {
                        let rhs = self.describe_expr(*e);
                        let _ = writeln!(self.out, "{} {} = {};", prefix, name, rhs);
                    }
                    None => {
                        let _ = writeln!(self.out, "{} {};", prefix, name);
                    }
                }
            }
            StmtKind::VarTuple { names, initializer, .. } => {
                self.indent();
                let rhs = self.describe_expr(*initializer);
                let _ = writeln!(self.out, "var ({}) = {};", names.join(", "), rhs);
            }
            StmtKind::Expression(e) => {
                self.indent();
                let _ = writeln!(self.out, "{};", self.describe_expr(*e));
            }
            StmtKind::If { condition, then_branch, else_branch } => {
                let header = format!("if ({})", self.describe_expr(*condition));
                self.brace_open(&header);
                self.depth += 1;
                self.print_stmt(*then_branch);
                self.depth -= 1;
                self.brace_close();
                if let Some(else_branch) = else_branch {
                    self.indent();
                    let _ = writeln!(self.out, "else");
                    self.depth += 1;
                    self.print_stmt(*else_branch);
                    self.depth -= 1;
                }
            }
            StmtKind::While { condition, body } => {
                let header = format!("while ({})", self.describe_expr(*condition));
                self.brace_open(&header);
                self.depth += 1;
                self.print_stmt(*body);
                self.depth -= 1;
                self.brace_close();
            }
            StmtKind::For { condition, body, .. } => {
                let cond = condition.map(|c| self.describe_expr(c)).unwrap_or_default();
                let header = format!("for (; {}; )", cond);
                self.brace_open(&header);
                self.depth += 1;
                self.print_stmt(*body);
                self.depth -= 1;
                self.brace_close();
            }
            StmtKind::Return { value } => {
                self.indent();
                match value {
                    Some(e) => {
                        let _ = writeln!(self.out, "return {};", self.describe_expr(*e));
                    }
                    None => {
                        let _ = writeln!(self.out, "return;");
                    }
                }
            }
            StmtKind::Break => {
                self.indent();
                let _ = writeln!(self.out, "break;");
            }
            StmtKind::Continue => {
                self.indent();
                let _ = writeln!(self.out, "continue;");
            }
            StmtKind::Switch { condition, cases, default } => {
                let header = format!("switch ({})", self.describe_expr(*condition));
                self.brace_open(&header);
                self.depth += 1;
                for case in cases {
                    self.indent();
                    let _ = writeln!(self.out, "{:?}:", case.value);
                    self.depth += 1;
                    for &s in &case.body {
                        self.print_stmt(s);
                    }
                    self.depth -= 1;
                }
                if let Some(default_body) = default {
                    self.indent();
                    let _ = writeln!(self.out, "default:");
                    self.depth += 1;
                    for &s in default_body {
                        self.print_stmt(s);
                    }
                    self.depth -= 1;
                }
                self.depth -= 1;
                self.brace_close();
            }
            StmtKind::Function(decl) => {
                let params = decl.params.iter().map(|p| p.name.clone()).collect::<Vec<_>>().join(", ");
                let header = format!("fn {}({})", decl.name, params);
                self.brace_open(&header);
                self.depth += 1;
                self.print_stmt(decl.body);
                self.depth -= 1;
                self.brace_close();
            }
            StmtKind::Class(decl) => {
                let header = format!("class {}", decl.name);
                self.brace_open(&header);
                self.depth += 1;
                for member in &decl.members {
                    self.indent();
                    let _ = writeln!(self.out, "{}: <ty>;", member.name);
                }
                for &method in &decl.methods {
                    self.print_stmt(method);
                }
                self.depth -= 1;
                self.brace_close();
            }
            StmtKind::Type { name, .. } => {
                self.indent();
                let _ = writeln!(self.out, "type {} = <ty>;", name);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn cli() -> CliConfig {
        CliConfig::parse_from(["nyx", "--main", "x.nyx"])
    }

    #[test]
    fn prints_var_declaration() {
        let mut ast = Ast::new();
        let lit = ast.add_expr(ExprKind::Literal(Literal::Int(41)), 1);
        let var = ast.add_stmt(
            StmtKind::Var { name: "x".to_string(), declared_type: None, initializer: Some(lit), is_ref: false, explicit_type: false },
            1,
        );
        let cli = cli();
        let out = AstPrinter::new(&ast, &cli).print_module("main", &[var]);
        assert!(out.contains("var x = 41;"));
    }
}
