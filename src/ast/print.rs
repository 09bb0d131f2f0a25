// Copyright 2021 The Simlin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

use std::fmt;

use super::{BinaryOp, BoolExpr, CommOp, IndexExpr, IndexType, LogicOp, NumExpr, VarPoint};
use crate::common::VarMap;

// binding strength; a child binding no tighter than its parent is
// parenthesized.
const PREC_OR: u8 = 1;
const PREC_AND: u8 = 2;
const PREC_CMP: u8 = 3;
const PREC_ADD: u8 = 4;
const PREC_MUL: u8 = 5;
const PREC_UNARY: u8 = 6;
const PREC_ATOM: u8 = 7;

fn num_precedence(expr: &NumExpr) -> u8 {
    match expr {
        NumExpr::Comm(c) if c.ops().len() > 1 => match c.op() {
            CommOp::Add => PREC_ADD,
            CommOp::Mul => PREC_MUL,
        },
        NumExpr::Op2(BinaryOp::Sub, _, _) => PREC_ADD,
        NumExpr::Op2(BinaryOp::Div | BinaryOp::Mod, _, _) => PREC_MUL,
        NumExpr::Neg(_) => PREC_UNARY,
        NumExpr::Const(v) if *v < 0.0 => PREC_UNARY,
        _ => PREC_ATOM,
    }
}

fn bool_precedence(expr: &BoolExpr) -> u8 {
    match expr {
        BoolExpr::Logic(LogicOp::Or, _, _) => PREC_OR,
        BoolExpr::Logic(LogicOp::And, _, _) => PREC_AND,
        BoolExpr::Cmp(_, _, _) => PREC_CMP,
        BoolExpr::Not(_) => PREC_UNARY,
    }
}

fn paren_if(s: String, child: u8, parent: u8) -> String {
    if child < PREC_ATOM && child <= parent {
        format!("({s})")
    } else {
        s
    }
}

fn const_str(val: f64) -> String {
    if val.is_finite() && val.fract() == 0.0 && val.abs() < 1e15 {
        format!("{}", val as i64)
    } else {
        format!("{val}")
    }
}

struct PrintVisitor<'a> {
    var_map: Option<&'a VarMap>,
}

impl PrintVisitor<'_> {
    fn dim_name<'b>(&'b self, name: &'b str) -> &'b str {
        self.var_map
            .and_then(|m| m.get(name))
            .map(|s| s.as_str())
            .unwrap_or(name)
    }

    fn index(&self, idx: &IndexExpr) -> String {
        let name = self.dim_name(&idx.name);
        match idx.kind {
            IndexType::First => format!("FIRST_INDEX({name})"),
            IndexType::Last => format!("LAST_INDEX({name})"),
            _ => name.to_owned(),
        }
    }

    fn child(&self, parent: u8, child: &NumExpr) -> String {
        paren_if(self.walk(child), num_precedence(child), parent)
    }

    fn walk(&self, expr: &NumExpr) -> String {
        let prec = num_precedence(expr);
        match expr {
            NumExpr::Const(v) => const_str(*v),
            NumExpr::Index(idx) => self.index(idx),
            NumExpr::Code(code) => code.clone(),
            NumExpr::Neg(e) => format!("-{}", self.child(prec, e)),
            NumExpr::Op2(op, l, r) => {
                format!("{} {} {}", self.child(prec, l), op.as_str(), self.child(prec, r))
            }
            NumExpr::Comm(c) => {
                if c.ops().is_empty() {
                    return const_str(c.op().base_value());
                }
                let sep = format!(" {} ", c.op().as_str());
                let ops: Vec<String> = c.ops().iter().map(|e| self.child(prec, e)).collect();
                ops.join(&sep)
            }
            NumExpr::Func(f) => {
                let args: Vec<String> = f.args().iter().map(|e| self.walk(e)).collect();
                format!("{}({})", f.name(), args.join(", "))
            }
            NumExpr::Point(p) => self.point(p),
        }
    }

    fn point(&self, p: &VarPoint) -> String {
        let args: Vec<String> = p
            .var()
            .dims()
            .iter()
            .zip(p.args().iter())
            .map(|(dim, arg)| {
                if let Some(&ofs) = p.arg_offsets().get(&dim.name) {
                    let name = self.dim_name(&dim.name);
                    match ofs {
                        0 => name.to_owned(),
                        ofs if ofs > 0 => format!("{name}+{ofs}"),
                        ofs => format!("{name}{ofs}"),
                    }
                } else if let Some(val) = p.arg_consts().get(&dim.name) {
                    val.to_string()
                } else {
                    self.walk(arg)
                }
            })
            .collect();
        format!("{}({})", p.var_name(), args.join(", "))
    }

    fn walk_bool(&self, expr: &BoolExpr) -> String {
        let prec = bool_precedence(expr);
        match expr {
            BoolExpr::Not(e) => {
                format!("!{}", paren_if(self.walk_bool(e), bool_precedence(e), prec))
            }
            BoolExpr::Cmp(op, l, r) => {
                format!("{} {} {}", self.child(prec, l), op.as_str(), self.child(prec, r))
            }
            BoolExpr::Logic(op, l, r) => format!(
                "{} {} {}",
                paren_if(self.walk_bool(l), bool_precedence(l), prec),
                op.as_str(),
                paren_if(self.walk_bool(r), bool_precedence(r), prec),
            ),
        }
    }
}

pub(super) fn num_str(expr: &NumExpr, var_map: Option<&VarMap>) -> String {
    PrintVisitor { var_map }.walk(expr)
}

pub(super) fn bool_str(expr: &BoolExpr, var_map: Option<&VarMap>) -> String {
    PrintVisitor { var_map }.walk_bool(expr)
}

pub(super) fn point_str(point: &VarPoint, var_map: Option<&VarMap>) -> String {
    PrintVisitor { var_map }.point(point)
}

impl fmt::Display for IndexExpr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", PrintVisitor { var_map: None }.index(self))
    }
}

#[cfg(test)]
mod tests {
    use crate::ast::{call, code, constant, domain_index, first_index, last_index, step_index};
    use crate::common::VarMap;

    #[test]
    fn test_precedence() {
        let x = || domain_index("x");
        let y = || domain_index("y");
        let cases: Vec<(String, &str)> = vec![
            (((x() + y()) * 2.0).to_string(), "(x + y) * 2"),
            ((x() + y() * 2.0).to_string(), "x + y * 2"),
            ((x() - (y() - 1.0)).to_string(), "x - (y - 1)"),
            (((x() - y()) - 1.0).to_string(), "(x - y) - 1"),
            ((x() / (y() * 2.0)).to_string(), "x / (y * 2)"),
            ((-(x() + y())).to_string(), "-(x + y)"),
            ((-x()).to_string(), "-x"),
            ((x() % 4.0).to_string(), "x % 4"),
            ((x() * 0.5).to_string(), "x * 0.5"),
            ((-constant(-1.0)).to_string(), "-(-1)"),
            (call("sin", vec![x() + 1.0, y()]).to_string(), "sin(x + 1, y)"),
            ((first_index("x") + 1.0).to_string(), "FIRST_INDEX(x) + 1"),
            (last_index("y").to_string(), "LAST_INDEX(y)"),
            ((code("foo()") * step_index("t")).to_string(), "foo() * t"),
        ];
        for (actual, expected) in cases {
            assert_eq!(expected, actual);
        }
    }

    #[test]
    fn test_bool_precedence() {
        let x = || domain_index("x");
        let a = x().less_than(1.0) | x().greater_than(5.0);
        let b = a.clone() & x().not_equal_to(3.0);
        assert_eq!("x < 1 || x > 5", a.to_string());
        assert_eq!("(x < 1 || x > 5) && x != 3", b.to_string());
        assert_eq!("!(x == 3)", (!x().is_equal_to(3.0)).to_string());
        assert_eq!("x + 1 >= 2", (x() + 1.0).not_less_than(2.0).to_string());
    }

    #[test]
    fn test_var_map() {
        let mut map = VarMap::new();
        map.insert("x".to_owned(), "x_idx".to_owned());
        let e = domain_index("x") + domain_index("y") + first_index("x");
        assert_eq!("x_idx + y + FIRST_INDEX(x_idx)", e.render(Some(&map)));
    }
}
