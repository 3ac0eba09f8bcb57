use crate::chain::classify;
use crate::document::{ObjectBuilder, ResultDocument};
use crate::error::RunError;
use crate::source::TableSource;
use tracing::{debug, trace};

/// What a successful walk visited
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Traversal {
    pub chains: usize,
    pub rules: usize,
}

/// Walk the table's chains into the document's `chains` member.
///
/// With a `filter`, only the chain of exactly that name is visited. Entries
/// are written in the table's own order and are never removed: when a later
/// query fails, everything written so far stays in the document and every
/// open scope is closed on the way out.
pub fn traverse<T: TableSource + ?Sized>(
    table: &T,
    filter: Option<&str>,
    doc: &mut ResultDocument,
) -> Result<Traversal, RunError> {
    let mut visited = Traversal::default();
    let mut chains = doc.begin_object("chains");

    for name in table.chains().map_err(RunError::from_query)? {
        if filter.is_some_and(|wanted| wanted != name) {
            continue;
        }

        let kind = classify(table, &name);
        let mut entry = chains.begin_object(&name);
        kind.write_members(&mut entry);

        let rules_scope = entry.begin_array("rules");
        let rules = table.rules(&name).map_err(RunError::from_query)?;
        for (index, _rule) in rules.iter().enumerate() {
            trace!(chain = %name, position = index + 1, "rule");
        }
        rules_scope.end();
        entry.end();

        debug!(chain = %name, kind = kind.type_name(), rules = rules.len(), "chain visited");
        visited.chains += 1;
        visited.rules += rules.len();
    }

    if visited.chains == 0 {
        return Err(RunError::NotFound {
            chain: filter.map(str::to_string),
        });
    }

    Ok(visited)
}
