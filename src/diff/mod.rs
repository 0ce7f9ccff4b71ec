pub mod edit;

pub use edit::{
    apply_literal_substitution, apply_literal_substitution_with, substitute, EditOptions,
    EditReport, OccurrencePolicy, Substitution,
};
