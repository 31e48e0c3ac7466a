use crate::composite::binding::CompositeBinding;
use crate::composite::factory::CompositesFactory;
use crate::fragment::{FragmentType, TypeKeyword};
use std::fmt;
use std::hash::{Hash, Hasher};

/// Shape of a composite type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompositeTypeKind {
    Basic,
    Named,
    Pointer,
    Qualifier,
    Array,
    Function,
}

/// A type whose nested types and named targets are composite as well.
#[derive(Clone)]
pub struct CompositeType<'f> {
    representative: FragmentType,
    factory: &'f CompositesFactory<'f>,
}

impl<'f> CompositeType<'f> {
    pub(crate) fn new(representative: FragmentType, factory: &'f CompositesFactory<'f>) -> Self {
        Self {
            representative,
            factory,
        }
    }

    pub fn representative(&self) -> &FragmentType {
        &self.representative
    }

    pub fn kind(&self) -> CompositeTypeKind {
        match &self.representative {
            FragmentType::Basic(_) => CompositeTypeKind::Basic,
            FragmentType::Named { .. } => CompositeTypeKind::Named,
            FragmentType::Pointer(_) => CompositeTypeKind::Pointer,
            FragmentType::Qualifier { .. } => CompositeTypeKind::Qualifier,
            FragmentType::Array { .. } => CompositeTypeKind::Array,
            FragmentType::Function { .. } => CompositeTypeKind::Function,
        }
    }

    /// The nested type: pointer and qualifier target, array element or
    /// function return type.
    pub fn get_type(&self) -> Option<CompositeType<'f>> {
        let nested = match &self.representative {
            FragmentType::Pointer(target) => target,
            FragmentType::Qualifier { target, .. } => target,
            FragmentType::Array { element, .. } => element,
            FragmentType::Function { return_type, .. } => return_type,
            FragmentType::Basic(_) | FragmentType::Named { .. } => return None,
        };
        Some(self.factory.composite_type((**nested).clone()))
    }

    /// Parameter types of a function type.
    pub fn parameters(&self) -> Vec<CompositeType<'f>> {
        match &self.representative {
            FragmentType::Function { params, .. } => params
                .iter()
                .map(|p| self.factory.composite_type(p.clone()))
                .collect(),
            _ => Vec::new(),
        }
    }

    /// The binding a named type refers to, searched in every fragment.
    pub fn binding(&self) -> Option<CompositeBinding<'f>> {
        match &self.representative {
            FragmentType::Named { keyword, name } => self.factory.resolve_named_type(*keyword, name),
            _ => None,
        }
    }

    pub fn is_const(&self) -> bool {
        matches!(self.representative, FragmentType::Qualifier { is_const: true, .. })
    }

    pub fn is_volatile(&self) -> bool {
        matches!(
            self.representative,
            FragmentType::Qualifier {
                is_volatile: true,
                ..
            }
        )
    }

    pub fn array_size(&self) -> Option<u64> {
        match self.representative {
            FragmentType::Array { size, .. } => size,
            _ => None,
        }
    }
}

impl PartialEq for CompositeType<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.representative == other.representative
    }
}

impl Eq for CompositeType<'_> {}

impl Hash for CompositeType<'_> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.representative.hash(state);
    }
}

impl fmt::Display for CompositeType<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_type(f, &self.representative)
    }
}

impl fmt::Debug for CompositeType<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CompositeType({})", self)
    }
}

fn write_type(f: &mut fmt::Formatter<'_>, ty: &FragmentType) -> fmt::Result {
    match ty {
        FragmentType::Basic(name) => write!(f, "{}", name),
        FragmentType::Named { keyword, name } => {
            let prefix = match keyword {
                TypeKeyword::Struct => "struct ",
                TypeKeyword::Union => "union ",
                TypeKeyword::Enum => "enum ",
                TypeKeyword::Class => "class ",
                TypeKeyword::Plain => "",
            };
            write!(f, "{}{}", prefix, name.join("::"))
        }
        FragmentType::Pointer(target) => {
            write_type(f, target)?;
            write!(f, " *")
        }
        FragmentType::Qualifier {
            is_const,
            is_volatile,
            target,
        } => {
            if *is_const {
                write!(f, "const ")?;
            }
            if *is_volatile {
                write!(f, "volatile ")?;
            }
            write_type(f, target)
        }
        FragmentType::Array { size, element } => {
            write_type(f, element)?;
            match size {
                Some(size) => write!(f, "[{}]", size),
                None => write!(f, "[]"),
            }
        }
        FragmentType::Function {
            return_type,
            params,
        } => {
            write_type(f, return_type)?;
            write!(f, " (")?;
            for (i, param) in params.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write_type(f, param)?;
            }
            write!(f, ")")
        }
    }
}
