use crate::planner::LogicalPlan;

const INDENT: &str = "  ";

/// Renders a plan tree, one `\n`-terminated line per plan node.
///
/// Each level nests two spaces deeper. Expressions render inline on their
/// node's line; plans nested inside expressions and scan sources are
/// rendered below the node's own inputs.
pub fn format(plan: &LogicalPlan, indent: usize) -> String {
    let mut out = String::new();
    write_plan(&mut out, plan, indent);
    out
}

fn write_plan(out: &mut String, plan: &LogicalPlan, indent: usize) {
    out.push_str(&INDENT.repeat(indent));
    out.push_str(&plan.to_string());
    out.push('\n');

    for child in plan.plans() {
        write_plan(out, child, indent + 1);
    }
}
