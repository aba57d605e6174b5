//! Messages attached to log-timer and log-size statements, in the
//! semicolon-separated format the profiler parses.

use crate::data::ast::SrcLoc;

pub fn t_nonrecursive_rule(relation: &str, src: &SrcLoc, clause: &str) -> String {
    format!("@t-nonrecursive-rule;{};{};{};", relation, src, clause)
}

pub fn t_nonrecursive_relation(relation: &str, src: &SrcLoc) -> String {
    format!("@t-nonrecursive-relation;{};{};", relation, src)
}

pub fn n_nonrecursive_relation(relation: &str, src: &SrcLoc) -> String {
    format!("@n-nonrecursive-relation;{};{};", relation, src)
}

pub fn t_recursive_rule(relation: &str, version: usize, src: &SrcLoc, clause: &str) -> String {
    format!("@t-recursive-rule;{};{};{};{};", relation, version, src, clause)
}

pub fn t_recursive_relation(relation: &str, src: &SrcLoc) -> String {
    format!("@t-recursive-relation;{};{};", relation, src)
}

pub fn c_recursive_relation(relation: &str, src: &SrcLoc) -> String {
    format!("@c-recursive-relation;{};{};", relation, src)
}

pub fn t_relation_load_time(relation: &str, src: &SrcLoc) -> String {
    format!("@t-relation-load-time;{};{};", relation, src)
}

pub fn t_relation_save_time(relation: &str, src: &SrcLoc) -> String {
    format!("@t-relation-save-time;{};{};", relation, src)
}

pub fn runtime() -> String {
    "@runtime;".to_owned()
}

/// Flattens free text into a single profiler field.
pub fn stringify(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            '\n' | '\r' => ' ',
            ';' => ',',
            '"' => '\'',
            c => c,
        })
        .collect()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn stringify_flattens_fields() {
        assert_eq!(stringify("a;b\nc\"d\""), "a,b c'd'");
    }
}
