//! Classification of bindings whose provenance is not known statically.
//!
//! Scope resolution sees bindings from fragments mixed with placeholders
//! produced by the surrounding language model. Fragment bindings are
//! wrapped; everything else passes through unchanged.

use crate::composite::binding::CompositeBinding;
use crate::composite::factory::CompositesFactory;
use crate::fragment::FragmentBinding;

/// Placeholder for a name that could not be resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProblemBinding {
    pub name: String,
    pub message: String,
}

/// A template instance; specializations are never stored in fragments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecializationBinding {
    pub name: String,
    pub arguments: Vec<String>,
}

/// A composite built by an AST-level resolver rather than this layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntheticBinding {
    pub name: String,
    pub origin: String,
}

/// A binding of statically unknown provenance.
///
/// New binding kinds appear over time; they arrive as `Other` until this
/// layer learns about them.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum UncertainBinding {
    Fragment(FragmentBinding),
    Problem(ProblemBinding),
    Specialization(SpecializationBinding),
    Synthetic(SyntheticBinding),
    Other { type_name: String, name: String },
}

impl UncertainBinding {
    pub fn name(&self) -> &str {
        match self {
            Self::Fragment(b) => &b.name,
            Self::Problem(b) => &b.name,
            Self::Specialization(b) => &b.name,
            Self::Synthetic(b) => &b.name,
            Self::Other { name, .. } => name,
        }
    }
}

/// Outcome of [`CompositesFactory::process_uncertain_binding`].
#[derive(Debug, Clone)]
pub enum ClassifiedBinding<'f> {
    Composite(CompositeBinding<'f>),
    PassThrough(UncertainBinding),
}

impl<'f> ClassifiedBinding<'f> {
    pub fn as_composite(&self) -> Option<&CompositeBinding<'f>> {
        match self {
            Self::Composite(binding) => Some(binding),
            Self::PassThrough(_) => None,
        }
    }
}

impl CompositesFactory<'_> {
    /// Wrap fragment bindings, pass placeholders through, and log (but
    /// still pass through) anything unrecognised.
    pub fn process_uncertain_binding(&self, binding: UncertainBinding) -> ClassifiedBinding<'_> {
        match binding {
            UncertainBinding::Fragment(fragment_binding) => {
                ClassifiedBinding::Composite(self.composite_binding(fragment_binding))
            }
            passive @ (UncertainBinding::Problem(_)
            | UncertainBinding::Specialization(_)
            | UncertainBinding::Synthetic(_)) => ClassifiedBinding::PassThrough(passive),
            UncertainBinding::Other { type_name, name } => {
                tracing::warn!(
                    "Unhandled binding type {} for `{}` during scope resolution",
                    type_name,
                    name
                );
                ClassifiedBinding::PassThrough(UncertainBinding::Other { type_name, name })
            }
        }
    }
}
