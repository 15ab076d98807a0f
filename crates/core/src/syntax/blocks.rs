use tree_sitter::Node;

/// Estimate how many SSA basic blocks a function body lowers to.
///
/// Counts one entry block plus the blocks each branching construct adds when
/// lowered: `if` (then, done, optional else), loops (body, loop head, done,
/// optional post), switch/select (a test and a body per case, one done) and
/// short-circuit `&&`/`||` (rhs, done). Function literals lower to separate
/// functions and are not counted.
pub fn estimate_blocks(body: Node<'_>) -> u32 {
    let mut blocks = 1;
    let mut stack = vec![body];
    while let Some(node) = stack.pop() {
        blocks += match node.kind() {
            "if_statement" => 2 + u32::from(node.child_by_field_name("alternative").is_some()),
            "for_statement" => loop_blocks(node),
            "expression_switch_statement" | "type_switch_statement" | "select_statement" => {
                switch_blocks(node)
            }
            "binary_expression" => short_circuit_blocks(node),
            _ => 0,
        };

        let mut cursor = node.walk();
        stack.extend(node.named_children(&mut cursor).filter(|c| c.kind() != "func_literal"));
    }
    blocks
}

fn loop_blocks(node: Node<'_>) -> u32 {
    let mut cursor = node.walk();
    let has_post = node
        .named_children(&mut cursor)
        .find(|c| c.kind() == "for_clause")
        .is_some_and(|clause| clause.child_by_field_name("update").is_some());
    if has_post {
        4
    } else {
        3
    }
}

fn switch_blocks(node: Node<'_>) -> u32 {
    let mut cursor = node.walk();
    let cases: u32 = node
        .named_children(&mut cursor)
        .map(|c| match c.kind() {
            "expression_case" | "type_case" | "communication_case" => 2,
            "default_case" => 1,
            _ => 0,
        })
        .sum();
    1 + cases
}

fn short_circuit_blocks(node: Node<'_>) -> u32 {
    match node.child_by_field_name("operator").map(|op| op.kind()) {
        Some("&&") | Some("||") => 2,
        _ => 0,
    }
}
