//! Kernel type graph
//!
//! A read-only model of the BTF kinds the compiler walks: integers, pointers,
//! structs/unions with bit-offset members, typedefs, cv-qualifiers and enums.
//! Loading a BTF blob is the job of an external collaborator: it populates a
//! [`Btf`] value (ids are interning order) and hands it to the compiler, which
//! never mutates it. A `Btf` can be shared read-only across any number of
//! concurrent compilations.

use std::collections::HashMap;

/// Identifier of a type in the graph
///
/// Id 0 is reserved for `void`, as in kernel BTF.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeId(pub u32);

/// An integer type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Int {
    pub name: String,
    /// Size in bytes
    pub size: u32,
    /// Whether comparisons on this type are signed
    pub signed: bool,
}

/// One member of a struct or union
///
/// `name` is `None` for anonymous struct/union members; lookup recurses into
/// those, accumulating their bit offsets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Member {
    pub name: Option<String>,
    /// Offset from the start of the enclosing composite, in bits
    pub bit_offset: u32,
    /// Non-zero for bitfield members
    pub bitfield_size: u32,
    pub ty: TypeId,
}

/// A struct or union body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Composite {
    pub name: Option<String>,
    /// Size in bytes
    pub size: u32,
    pub members: Vec<Member>,
}

/// A node in the type graph
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Type {
    /// The reserved id-0 type
    Void,
    Int(Int),
    Pointer { target: TypeId },
    Struct(Composite),
    Union(Composite),
    Typedef { name: String, ty: TypeId },
    Const { ty: TypeId },
    Volatile { ty: TypeId },
    Restrict { ty: TypeId },
    /// Enums compare as signed integers of their size
    Enum { name: Option<String>, size: u32 },
}

/// A member found by [`Btf::find_member`], with the accumulated bit offset of
/// every anonymous container on the way down.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedMember {
    pub bit_offset: u32,
    pub bitfield_size: u32,
    pub ty: TypeId,
}

/// The type graph
#[derive(Debug, Default, Clone)]
pub struct Btf {
    types: Vec<Type>,
    by_name: HashMap<String, TypeId>,
}

impl Btf {
    pub fn new() -> Self {
        Self {
            types: vec![Type::Void],
            by_name: HashMap::new(),
        }
    }

    /// Intern a type, registering its name (first definition wins)
    pub fn add(&mut self, ty: Type) -> TypeId {
        let id = TypeId(self.types.len() as u32);
        if let Some(name) = type_name(&ty) {
            self.by_name.entry(name.to_string()).or_insert(id);
        }
        self.types.push(ty);
        id
    }

    pub fn add_int(&mut self, name: &str, size: u32, signed: bool) -> TypeId {
        self.add(Type::Int(Int {
            name: name.to_string(),
            size,
            signed,
        }))
    }

    pub fn add_pointer(&mut self, target: TypeId) -> TypeId {
        self.add(Type::Pointer { target })
    }

    pub fn add_struct(&mut self, name: Option<&str>, size: u32, members: Vec<Member>) -> TypeId {
        self.add(Type::Struct(Composite {
            name: name.map(str::to_string),
            size,
            members,
        }))
    }

    pub fn add_union(&mut self, name: Option<&str>, size: u32, members: Vec<Member>) -> TypeId {
        self.add(Type::Union(Composite {
            name: name.map(str::to_string),
            size,
            members,
        }))
    }

    pub fn add_typedef(&mut self, name: &str, ty: TypeId) -> TypeId {
        self.add(Type::Typedef {
            name: name.to_string(),
            ty,
        })
    }

    pub fn add_const(&mut self, ty: TypeId) -> TypeId {
        self.add(Type::Const { ty })
    }

    pub fn add_volatile(&mut self, ty: TypeId) -> TypeId {
        self.add(Type::Volatile { ty })
    }

    pub fn add_restrict(&mut self, ty: TypeId) -> TypeId {
        self.add(Type::Restrict { ty })
    }

    pub fn add_enum(&mut self, name: Option<&str>, size: u32) -> TypeId {
        self.add(Type::Enum {
            name: name.map(str::to_string),
            size,
        })
    }

    pub fn get(&self, id: TypeId) -> Option<&Type> {
        self.types.get(id.0 as usize)
    }

    pub fn type_by_name(&self, name: &str) -> Option<TypeId> {
        self.by_name.get(name).copied()
    }

    /// Name of a type, following typedef/qualifier chains until one is found
    pub fn name_of(&self, mut id: TypeId) -> Option<&str> {
        loop {
            let ty = self.get(id)?;
            match ty {
                Type::Const { ty } | Type::Volatile { ty } | Type::Restrict { ty } => id = *ty,
                _ => return type_name(ty),
            }
        }
    }

    /// Strip typedefs and cv-qualifiers down to the underlying type
    pub fn skip_mods_and_typedefs(&self, mut id: TypeId) -> TypeId {
        while let Some(
            Type::Typedef { ty, .. }
            | Type::Const { ty }
            | Type::Volatile { ty }
            | Type::Restrict { ty },
        ) = self.get(id)
        {
            id = *ty;
        }
        id
    }

    /// Whether the typedef chain of `id` carries the kernel's big-endian
    /// annotation (a `__be`-prefixed typedef such as `__be16`).
    pub fn is_big_endian(&self, mut id: TypeId) -> bool {
        loop {
            match self.get(id) {
                Some(Type::Typedef { name, ty }) => {
                    if name.starts_with("__be") {
                        return true;
                    }
                    id = *ty;
                }
                Some(Type::Const { ty } | Type::Volatile { ty } | Type::Restrict { ty }) => {
                    id = *ty;
                }
                _ => return false,
            }
        }
    }

    /// Look up a named member of a struct/union, recursing into anonymous
    /// members and accumulating their bit offsets.
    ///
    /// `id` must already be stripped to a `Struct` or `Union`.
    pub fn find_member(&self, id: TypeId, name: &str) -> Option<ResolvedMember> {
        let (Type::Struct(composite) | Type::Union(composite)) = self.get(id)? else {
            return None;
        };

        for member in &composite.members {
            match member.name.as_deref() {
                Some(member_name) if member_name == name => {
                    return Some(ResolvedMember {
                        bit_offset: member.bit_offset,
                        bitfield_size: member.bitfield_size,
                        ty: member.ty,
                    });
                }
                Some(_) => {}
                None => {
                    let inner = self.skip_mods_and_typedefs(member.ty);
                    if let Some(found) = self.find_member(inner, name) {
                        return Some(ResolvedMember {
                            bit_offset: member.bit_offset + found.bit_offset,
                            bitfield_size: found.bitfield_size,
                            ty: found.ty,
                        });
                    }
                }
            }
        }
        None
    }
}

fn type_name(ty: &Type) -> Option<&str> {
    match ty {
        Type::Int(int) => Some(&int.name),
        Type::Struct(composite) | Type::Union(composite) => composite.name.as_deref(),
        Type::Typedef { name, .. } => Some(name),
        Type::Enum { name, .. } => name.as_deref(),
        _ => None,
    }
}
