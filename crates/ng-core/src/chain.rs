use crate::document::ObjectBuilder;
use crate::source::{Counters, TableSource};
use tracing::debug;

/// What a chain is, decided once from whether it has a default policy
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainKind {
    Builtin { policy: String, counters: Counters },
    /// `refs` is `None` when the reference count could not be read
    UserDefined { refs: Option<u32> },
}

impl ChainKind {
    pub fn type_name(&self) -> &'static str {
        match self {
            ChainKind::Builtin { .. } => "builtin",
            ChainKind::UserDefined { .. } => "user",
        }
    }

    /// Write the chain header members into an open chain object
    pub fn write_members<B: ObjectBuilder + ?Sized>(&self, builder: &mut B) {
        builder.add_string("type", self.type_name());
        match self {
            ChainKind::Builtin { policy, counters } => {
                builder.add_string("policy", policy);
                builder.add_int("packets", counters.packets);
                builder.add_int("bytes", counters.bytes);
            }
            ChainKind::UserDefined { refs } => {
                if let Some(refs) = refs {
                    builder.add_int("refs", u64::from(*refs));
                }
            }
        }
    }
}

/// Classify one chain of an opened table
pub fn classify<T: TableSource + ?Sized>(table: &T, chain: &str) -> ChainKind {
    if let Some(policy) = table.policy(chain).filter(|p| !p.target.is_empty()) {
        return ChainKind::Builtin {
            policy: policy.target,
            counters: policy.counters,
        };
    }

    match table.references(chain) {
        Ok(refs) => ChainKind::UserDefined { refs: Some(refs) },
        Err(e) => {
            debug!(chain, error = %e, "reference count unavailable");
            ChainKind::UserDefined { refs: None }
        }
    }
}
