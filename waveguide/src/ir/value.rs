//! The value store: typed memory cells referenced by commands.

use serde::{Deserialize, Serialize};

use crate::error::LowerError;

use super::{DataType, ValueId};

/// Where a value's bytes live.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Storage {
    /// A byte block of exactly `type.byte_len()` bytes.
    Owned(Vec<u8>),
    /// A redirection to another value's storage, `byte_offset` bytes in.
    /// Proxy-typed values use offset 0; element views into arrays carry
    /// the element's position.
    Proxy { target: ValueId, byte_offset: usize },
}

/// A typed storage cell.
///
/// The known flag marks bytes that hold a materialized compile-time-known
/// datum; for proxies, known-ness is the target's and must be read through
/// [`super::Program::value_known`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Value {
    ty: DataType,
    storage: Storage,
    known: bool,
    label: Option<String>,
}

impl Value {
    /// Allocate a zeroed, non-known value. The type must not be a proxy
    /// type; proxies need a target and are built with [`Value::new_proxy`].
    pub fn new(ty: DataType) -> Self {
        assert!(!ty.is_proxy(), "proxy values require a target");
        let storage = Storage::Owned(vec![0; ty.byte_len()]);
        Self {
            ty,
            storage,
            known: false,
            label: None,
        }
    }

    /// Allocate a known value with the given bytes.
    pub fn new_known(ty: DataType, bytes: Vec<u8>) -> Self {
        assert!(!ty.is_proxy(), "proxy values require a target");
        assert_eq!(bytes.len(), ty.byte_len(), "byte block does not fit type");
        Self {
            ty,
            storage: Storage::Owned(bytes),
            known: true,
            label: None,
        }
    }

    /// Build a proxy value: a proxy-typed cell whose storage is `target`.
    pub fn new_proxy(ty: DataType, target: ValueId) -> Self {
        assert!(ty.is_proxy(), "new_proxy requires a proxy type");
        Self {
            ty,
            storage: Storage::Proxy {
                target,
                byte_offset: 0,
            },
            known: false,
            label: None,
        }
    }

    /// Build an element view: a value of the element's (non-proxy) type
    /// addressing `byte_offset` bytes into `target`'s storage.
    pub fn element_view(ty: DataType, target: ValueId, byte_offset: usize) -> Self {
        Self {
            ty,
            storage: Storage::Proxy {
                target,
                byte_offset,
            },
            known: false,
            label: None,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Known-value constructors used for literals.
    pub fn known_int(v: i32) -> Self {
        Self::new_known(DataType::Int, v.to_le_bytes().to_vec())
    }

    pub fn known_float(v: f32) -> Self {
        Self::new_known(DataType::Float, v.to_le_bytes().to_vec())
    }

    pub fn known_bool(v: bool) -> Self {
        Self::new_known(DataType::Bool, vec![v as u8])
    }

    pub fn ty(&self) -> &DataType {
        &self.ty
    }

    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    /// Whether this cell forwards to another value.
    pub fn is_proxy(&self) -> bool {
        matches!(self.storage, Storage::Proxy { .. })
    }

    /// The local known flag. Proxies forward known-ness to their target;
    /// resolve through the program arena instead of reading this directly.
    pub fn known_flag(&self) -> bool {
        self.known
    }

    pub fn set_known(&mut self, known: bool) {
        assert!(!self.is_proxy(), "known flag lives on the proxy target");
        self.known = known;
    }

    /// Swap the type without touching storage. Permitted only when the
    /// byte length and proxy-ness are preserved.
    pub fn re_type(&mut self, new_ty: DataType) -> Result<(), LowerError> {
        if new_ty.byte_len() != self.ty.byte_len() {
            return Err(LowerError::TypeMismatch(format!(
                "cannot re-type `{}` ({} bytes) as `{}` ({} bytes)",
                self.ty,
                self.ty.byte_len(),
                new_ty,
                new_ty.byte_len()
            )));
        }
        if new_ty.is_proxy() != self.ty.is_proxy() {
            return Err(LowerError::TypeMismatch(format!(
                "cannot re-type `{}` as `{}`: proxy-ness differs",
                self.ty, new_ty
            )));
        }
        self.ty = new_ty;
        Ok(())
    }

    /// Copy a known value into fresh storage.
    pub fn create_known_copy(&self) -> Self {
        assert!(self.known, "create_known_copy requires a known value");
        let Storage::Owned(bytes) = &self.storage else {
            unreachable!("known flag is never set on proxy storage");
        };
        Self {
            ty: self.ty.clone(),
            storage: Storage::Owned(bytes.clone()),
            known: true,
            label: None,
        }
    }

    pub fn bytes(&self) -> Option<&[u8]> {
        match &self.storage {
            Storage::Owned(bytes) => Some(bytes),
            Storage::Proxy { .. } => None,
        }
    }

    pub fn bytes_mut(&mut self) -> Option<&mut Vec<u8>> {
        match &mut self.storage {
            Storage::Owned(bytes) => Some(bytes),
            Storage::Proxy { .. } => None,
        }
    }

    fn typed_bytes(&self, expect: &DataType) -> Result<&[u8], LowerError> {
        if self.is_proxy() {
            return Err(LowerError::TypeMismatch(format!(
                "typed access through a proxy of `{}`",
                self.ty
            )));
        }
        if &self.ty != expect {
            return Err(LowerError::TypeMismatch(format!(
                "expected `{}`, value is `{}`",
                expect, self.ty
            )));
        }
        Ok(self.bytes().unwrap())
    }

    pub fn as_int(&self) -> Result<i32, LowerError> {
        let bytes = self.typed_bytes(&DataType::Int)?;
        Ok(i32::from_le_bytes(bytes[0..4].try_into().unwrap()))
    }

    pub fn as_float(&self) -> Result<f32, LowerError> {
        let bytes = self.typed_bytes(&DataType::Float)?;
        Ok(f32::from_le_bytes(bytes[0..4].try_into().unwrap()))
    }

    pub fn as_bool(&self) -> Result<bool, LowerError> {
        let bytes = self.typed_bytes(&DataType::Bool)?;
        Ok(bytes[0] != 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_new_is_zeroed_and_unknown() {
        let v = Value::new(DataType::array(DataType::Int, 2));
        assert!(!v.known_flag());
        assert_eq!(v.bytes().unwrap(), &[0u8; 8][..]);
    }

    #[test]
    fn test_typed_accessors() {
        assert_eq!(Value::known_int(-41).as_int().unwrap(), -41);
        assert_eq!(Value::known_float(2.5).as_float().unwrap(), 2.5);
        assert!(Value::known_bool(true).as_bool().unwrap());
    }

    #[test]
    fn test_typed_accessor_rejects_wrong_type() {
        let err = Value::known_int(1).as_float().unwrap_err();
        assert!(matches!(err, LowerError::TypeMismatch(_)));
    }

    #[test]
    fn test_re_type_preserving_byte_len() {
        // Int and Float are both 4 bytes.
        let mut v = Value::known_int(1);
        v.re_type(DataType::Float).unwrap();
        assert_eq!(v.ty(), &DataType::Float);
    }

    #[test]
    fn test_re_type_rejects_size_change() {
        let mut v = Value::known_int(1);
        let err = v.re_type(DataType::Bool).unwrap_err();
        assert!(matches!(err, LowerError::TypeMismatch(_)));
    }

    #[test]
    fn test_create_known_copy() {
        let v = Value::known_int(7);
        let copy = v.create_known_copy();
        assert!(copy.known_flag());
        assert_eq!(copy.as_int().unwrap(), 7);
    }

    #[test]
    #[should_panic(expected = "create_known_copy requires a known value")]
    fn test_known_copy_of_unknown_panics() {
        Value::new(DataType::Int).create_known_copy();
    }
}
