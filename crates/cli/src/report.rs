use provreq_graph::search::{PromiseStats, PromiseUsage};
use provreq_graph::{StageRow, Technique};
use std::collections::{BTreeMap, BTreeSet};

/// ATT&CK tactic order used for bundle columns.
pub const TACTIC_ORDER: [&str; 14] = [
    "Reconnaissance",
    "Resource Development",
    "Initial Access",
    "Execution",
    "Persistence",
    "Privilege Escalation",
    "Defense Evasion",
    "Credential Access",
    "Discovery",
    "Lateral Movement",
    "Collection",
    "Command and Control",
    "Exfiltration",
    "Impact",
];

/// Pipe table with one header row. Cells holding several values are joined with `, `.
pub fn render_table(headers: &[&str], rows: &[Vec<String>]) -> String {
    let mut out = String::new();
    out.push_str(&format!("| {} |\n", headers.join(" | ")));
    out.push_str(&format!("|{}\n", "---|".repeat(headers.len())));
    for row in rows {
        let cells: Vec<String> = row.iter().map(|cell| escape_cell(cell)).collect();
        out.push_str(&format!("| {} |\n", cells.join(" | ")));
    }
    out
}

pub fn render_stages(rows: &[StageRow], show_promises: bool, show_classes: bool) -> String {
    let mut headers = vec!["stage", "agents"];
    if show_promises {
        headers.push("new promises @end-of-stage");
    }
    if show_classes {
        headers.push("agent_classes");
    }

    let table: Vec<Vec<String>> = rows
        .iter()
        .map(|row| {
            let mut cells = vec![row.stage.to_string(), row.techniques.join(", ")];
            if let Some(promises) = &row.new_promises {
                cells.push(promises.join(", "));
            }
            if let Some(classes) = &row.agent_classes {
                cells.push(classes.join(", "));
            }
            cells
        })
        .collect();

    render_table(&headers, &table)
}

pub fn render_technique(id: &str, technique: &Technique) -> String {
    let children: Vec<&str> = technique
        .children
        .values()
        .filter_map(|child| child.name.as_deref())
        .collect();

    let mut out = format!("+++\n\t{id}: {}\n", technique.name);
    out.push_str(&render_table(
        &[
            "Provides",
            "Requires",
            "agent_class(s)",
            "Relevant",
            "Conditionals",
            "Children",
        ],
        &[vec![
            join_all(technique.provides.iter()),
            join_all(technique.requires.iter()),
            technique.agent_class.join(", "),
            technique.relevant_for.join(", "),
            join_all(technique.conditional_provides.keys()),
            children.join(", "),
        ]],
    ));
    out
}

pub fn render_dependencies(
    enabled_by: &BTreeMap<String, BTreeSet<String>>,
    enables: &BTreeMap<String, BTreeSet<String>>,
) -> String {
    let list = |related: &BTreeMap<String, BTreeSet<String>>| {
        related
            .iter()
            .map(|(id, promises)| format!("{id} ({})", join_all(promises.iter())))
            .collect::<Vec<_>>()
            .join(", ")
    };
    render_table(
        &["Enabled by", "Enables"],
        &[vec![list(enabled_by), list(enables)]],
    )
}

pub fn render_promise_stats(stats: &PromiseStats) -> String {
    let describe = |entries: &[(String, String)]| {
        entries
            .iter()
            .map(|(id, name)| format!("{id}: {name}"))
            .collect::<Vec<_>>()
            .join(", ")
    };

    let mut out = String::from("+++\nUsage\n");
    out.push_str(&render_table(
        &["Provides", "Requires"],
        &[vec![describe(&stats.provided_by), describe(&stats.required_by)]],
    ));
    out.push('\n');

    let classes: Vec<Vec<String>> = stats
        .classes
        .iter()
        .map(|(class, (provides, requires))| {
            vec![class.clone(), provides.to_string(), requires.to_string()]
        })
        .collect();
    out.push_str(&render_table(&["Tactic", "Provides", "Requires"], &classes));
    out.push_str(&format!(
        "Provided by {} conditional provides\n",
        stats.conditionally_provided_by.len()
    ));
    out
}

pub fn render_usage(rows: &[PromiseUsage]) -> String {
    let table: Vec<Vec<String>> = rows
        .iter()
        .map(|row| {
            vec![
                row.promise.clone(),
                row.provides.to_string(),
                row.requires.to_string(),
            ]
        })
        .collect();
    render_table(&["promise", "provides", "requires"], &table)
}

pub fn render_search(found: &[(&String, &Technique)]) -> String {
    let table: Vec<Vec<String>> = found
        .iter()
        .map(|(id, technique)| {
            vec![
                (*id).clone(),
                technique.name.clone(),
                technique.agent_class.join(", "),
            ]
        })
        .collect();
    let mut out = render_table(&["ID", "Name", "Tactic(s)"], &table);
    out.push_str(&format!("n={}\n", found.len()));
    out
}

/// Bundle entries grouped into one column per class, tactic order first.
pub fn render_bundle(entries: &[(String, Vec<String>)]) -> String {
    let mut columns: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
    for (label, classes) in entries {
        for class in classes {
            columns.entry(class.as_str()).or_default().push(label.as_str());
        }
    }

    let mut headers: Vec<&str> = TACTIC_ORDER.to_vec();
    headers.extend(
        columns
            .keys()
            .copied()
            .filter(|class| !TACTIC_ORDER.contains(class)),
    );

    let height = columns.values().map(Vec::len).max().unwrap_or(0);
    let rows: Vec<Vec<String>> = (0..height)
        .map(|i| {
            headers
                .iter()
                .map(|class| {
                    columns
                        .get(class)
                        .and_then(|labels| labels.get(i))
                        .map(|label| label.to_string())
                        .unwrap_or_default()
                })
                .collect()
        })
        .collect();

    render_table(&headers, &rows)
}

/// Shorten `text` to `n` chars, ending with `...` when cut.
pub fn shorten(text: &str, n: usize) -> String {
    if text.chars().count() <= n {
        return text.to_string();
    }
    let kept: String = text.chars().take(n.saturating_sub(3)).collect();
    format!("{kept}...")
}

/// Bundle cell label: shortened ID, and shortened name unless `id_only`.
pub fn bundle_label(id: &str, name: &str, n: usize, id_only: bool) -> String {
    if id_only {
        shorten(id, n)
    } else {
        format!("{} [{}]", shorten(id, n), shorten(name, n))
    }
}

fn join_all<'a>(items: impl Iterator<Item = &'a String>) -> String {
    items.map(String::as_str).collect::<Vec<_>>().join(", ")
}

fn escape_cell(text: &str) -> String {
    text.replace('|', "\\|")
}
