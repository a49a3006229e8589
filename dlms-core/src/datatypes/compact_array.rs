//! Compact array type for DLMS/COSEM protocol
//!
//! A compact array sends its element type once, as a type description, and
//! then every element body without tags.

use crate::datatypes::data_object::DataObject;
use crate::datatypes::data_type::DataType;
use crate::error::{DlmsError, DlmsResult};
use serde::{Deserialize, Serialize};

/// The type description of a COSEM compact array
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TypeDescription {
    /// A scalar or string type
    Simple(DataType),
    /// `count` elements of the same description
    Array {
        count: u16,
        element: Box<TypeDescription>,
    },
    /// A record of descriptions
    Structure(Vec<TypeDescription>),
}

impl TypeDescription {
    /// Outer A-XDR tag of this description.
    pub fn data_type(&self) -> DataType {
        match self {
            TypeDescription::Simple(t) => *t,
            TypeDescription::Array { .. } => DataType::Array,
            TypeDescription::Structure(_) => DataType::Structure,
        }
    }

    /// Derive a description from a sample element. Arrays take the shape
    /// of their first element.
    pub fn describe(value: &DataObject) -> DlmsResult<Self> {
        Ok(match value {
            DataObject::Structure(items) => TypeDescription::Structure(
                items.iter().map(Self::describe).collect::<DlmsResult<_>>()?,
            ),
            DataObject::Array(items) => {
                let first = items.first().ok_or_else(|| {
                    DlmsError::InvalidData("cannot describe an empty array".to_string())
                })?;
                TypeDescription::Array {
                    count: items.len() as u16,
                    element: Box::new(Self::describe(first)?),
                }
            }
            DataObject::CompactArray(_) => {
                return Err(DlmsError::InvalidData(
                    "compact arrays do not nest".to_string(),
                ));
            }
            other => TypeDescription::Simple(other.data_type()),
        })
    }

    /// Check that `value` has the shape this description announces.
    pub fn matches(&self, value: &DataObject) -> bool {
        match (self, value) {
            (TypeDescription::Structure(fields), DataObject::Structure(items)) => {
                fields.len() == items.len()
                    && fields.iter().zip(items).all(|(f, v)| f.matches(v))
            }
            (TypeDescription::Array { count, element }, DataObject::Array(items)) => {
                *count as usize == items.len() && items.iter().all(|v| element.matches(v))
            }
            (TypeDescription::Simple(t), v) => *t == v.data_type(),
            _ => false,
        }
    }
}

/// A COSEM compact array
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompactArray {
    description: TypeDescription,
    values: Vec<DataObject>,
}

impl CompactArray {
    /// Create a compact array. Every value must match `description`.
    pub fn new(description: TypeDescription, values: Vec<DataObject>) -> DlmsResult<Self> {
        if let Some(bad) = values.iter().position(|v| !description.matches(v)) {
            return Err(DlmsError::InvalidData(format!(
                "compact array element {} does not match its type description",
                bad
            )));
        }
        Ok(Self {
            description,
            values,
        })
    }

    /// Create a compact array whose description is taken from the first value.
    pub fn from_values(values: Vec<DataObject>) -> DlmsResult<Self> {
        let first = values.first().ok_or_else(|| {
            DlmsError::InvalidData("compact array needs at least one element".to_string())
        })?;
        let description = TypeDescription::describe(first)?;
        Self::new(description, values)
    }

    pub fn description(&self) -> &TypeDescription {
        &self.description
    }

    pub fn values(&self) -> &[DataObject] {
        &self.values
    }

    pub fn into_values(self) -> Vec<DataObject> {
        self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(a: u16, b: i32) -> DataObject {
        DataObject::Structure(vec![DataObject::Unsigned16(a), DataObject::Integer32(b)])
    }

    #[test]
    fn test_describe_structure() {
        let desc = TypeDescription::describe(&row(1, 2)).unwrap();
        assert_eq!(
            desc,
            TypeDescription::Structure(vec![
                TypeDescription::Simple(DataType::UInt16),
                TypeDescription::Simple(DataType::Int32),
            ])
        );
    }

    #[test]
    fn test_from_values() {
        let ca = CompactArray::from_values(vec![row(1, -1), row(2, -2)]).unwrap();
        assert_eq!(ca.len(), 2);
        assert_eq!(ca.description().data_type(), DataType::Structure);
    }

    #[test]
    fn test_shape_mismatch_rejected() {
        let result = CompactArray::from_values(vec![row(1, 1), DataObject::Unsigned16(3)]);
        assert!(result.is_err());
        assert!(CompactArray::from_values(vec![]).is_err());
    }
}
