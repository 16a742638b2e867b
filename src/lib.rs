//! Compile C-like member-access predicates into eBPF instructions.
//!
//! Given a predicate such as `skb->dev->ifindex == 1` and a type graph
//! describing the kernel structs involved, [`compile`] produces a sequence of
//! eBPF instructions that dereferences the root pointer argument hop by hop
//! (through the fault-safe `bpf_probe_read_kernel` helper) and compares the
//! terminal field against the constant, leaving 1 or 0 in `r0`.
//!
//! ```
//! use bpf_predicate::btf::{Btf, Member};
//! use bpf_predicate::{compile, resolve_labels};
//!
//! let mut btf = Btf::new();
//! let len_ty = btf.add_int("unsigned int", 4, false);
//! let sk_buff = btf.add_struct(
//!     Some("sk_buff"),
//!     232,
//!     vec![Member {
//!         name: Some("len".into()),
//!         bit_offset: 112 * 8,
//!         bitfield_size: 0,
//!         ty: len_ty,
//!     }],
//! );
//! let root = btf.add_pointer(sk_buff);
//!
//! let mut insns = compile(&btf, root, "skb->len > 1024")?;
//! resolve_labels(&mut insns)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! [`access`] is the splice-in form: it emits only the dereference chain,
//! parameterised over registers and the failure label, for callers building
//! a larger program around the loaded value.

pub mod btf;
pub mod compiler;
pub mod expr;
pub mod insn;

pub use compiler::{access, compile, AccessOptions, AccessResult, CompileError};
pub use insn::{encode, resolve_labels, Insn, Reg};
