//! Imports, exports and the links between them.

use std::ops::{Deref, DerefMut};

use bento_sig::FnSig;
use serde::Serialize;

use crate::error::Result;
use crate::tree::BoxId;

/// A named function declaration shared by imports and exports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FnDecl {
    /// Link name.
    pub name: String,
    /// Signature.
    pub sig: FnSig,
    /// Only link against this box, if set.
    pub scope: Option<String>,
    /// Symbol name used in generated code, if different from `name`.
    pub alias: Option<String>,
    /// Free-form documentation.
    pub doc: Option<String>,
    /// Weak linkage: imports may stay unlinked, exports may be overridden.
    pub weak: bool,
    /// Who declared this: the box name for recipe declarations, a runtime
    /// component name for declarations added by hooks.
    pub source: Option<String>,
}

impl FnDecl {
    /// A declaration with default metadata.
    pub fn new(name: impl Into<String>, sig: FnSig) -> Self {
        Self {
            name: name.into(),
            sig,
            scope: None,
            alias: None,
            doc: None,
            weak: false,
            source: None,
        }
    }

    /// Parse the signature string and build a declaration.
    pub fn parse(name: impl Into<String>, sig: &str) -> Result<Self> {
        Ok(Self::new(name, FnSig::parse(sig)?))
    }

    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into());
        self
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    pub fn with_doc(mut self, doc: impl Into<String>) -> Self {
        self.doc = Some(doc.into());
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn weak(mut self) -> Self {
        self.weak = true;
        self
    }

    /// Symbol name for generated code.
    pub fn symbol(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }

    /// Whether this declaration, seen from `self_box`, may bind to `other`
    /// declared in `other_box`.
    ///
    /// Names must match, signatures must be compatible, and each side's
    /// scope, if any, must name the box the other side lives in.
    pub fn is_linkable(&self, self_box: &str, other: &FnDecl, other_box: &str) -> bool {
        self.name == other.name
            && self.sig.is_compatible(&other.sig)
            && self.scope.as_deref().map_or(true, |s| s == other_box)
            && other.scope.as_deref().map_or(true, |s| s == self_box)
    }

    /// Scopes are satisfied in both directions, ignoring the signature.
    pub(crate) fn scopes_allow(&self, self_box: &str, other: &FnDecl, other_box: &str) -> bool {
        self.scope.as_deref().map_or(true, |s| s == other_box)
            && other.scope.as_deref().map_or(true, |s| s == self_box)
    }
}

/// Address of an import or export inside the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct DeclRef {
    /// Box holding the declaration.
    pub box_id: BoxId,
    /// Index into that box's imports or exports.
    pub index: usize,
}

/// A resolved binding of an import to an export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Link {
    pub export: DeclRef,
    pub import: DeclRef,
}

/// A function a box needs from its surroundings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Import {
    #[serde(flatten)]
    pub decl: FnDecl,
    /// Export this import is bound to, after linking.
    pub link: Option<Link>,
    /// Dispatch index among the box's linked imports.
    pub ordinal: Option<usize>,
}

impl Import {
    pub fn new(decl: FnDecl) -> Self {
        Self {
            decl,
            link: None,
            ordinal: None,
        }
    }
}

impl Deref for Import {
    type Target = FnDecl;

    fn deref(&self) -> &FnDecl {
        &self.decl
    }
}

impl DerefMut for Import {
    fn deref_mut(&mut self) -> &mut FnDecl {
        &mut self.decl
    }
}

/// A function a box offers to its surroundings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Export {
    #[serde(flatten)]
    pub decl: FnDecl,
    /// Every import bound to this export.
    pub links: Vec<Link>,
    /// Dispatch index among the box's linked exports.
    pub ordinal: Option<usize>,
}

impl Export {
    pub fn new(decl: FnDecl) -> Self {
        Self {
            decl,
            links: Vec::new(),
            ordinal: None,
        }
    }
}

impl Deref for Export {
    type Target = FnDecl;

    fn deref(&self) -> &FnDecl {
        &self.decl
    }
}

impl DerefMut for Export {
    fn deref_mut(&mut self) -> &mut FnDecl {
        &mut self.decl
    }
}
