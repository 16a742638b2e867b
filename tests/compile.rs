//! End-to-end compilation tests against a synthetic `sk_buff` type graph
//! laid out with Linux v6.8 offsets.

use bpf_predicate::btf::{Btf, Member, TypeId};
use bpf_predicate::compiler::{EXIT_FAIL_LABEL, RETURN_LABEL};
use bpf_predicate::insn::{opcode, Helper};
use bpf_predicate::{access, compile, encode, resolve_labels, AccessOptions, Insn, Reg};

fn member(name: &str, byte_offset: u32, ty: TypeId) -> Member {
    Member {
        name: Some(name.to_string()),
        bit_offset: byte_offset * 8,
        bitfield_size: 0,
        ty,
    }
}

/// Builds the slice of the kernel's type graph the tests walk:
///
/// ```text
/// struct sk_buff {
///     union { struct net_device *dev; unsigned long dev_scratch; }; // @16
///     unsigned int len;           // @112
///     __u8 pkt_type : 3;          // bitfield @ bit 1026
///     unsigned short vlan_tci;    // @158
///     __be16 protocol;            // @180
///     refcount_t users;           // @220
/// };
/// struct net_device { int ifindex; /* @224 */ possible_net_t nd_net; /* @280 */ };
/// struct net { struct ns_common ns; /* @120 */ };
/// struct ns_common { struct proc_ns_operations *ops; unsigned int inum; /* @16 */ };
/// ```
fn skb_btf() -> (Btf, TypeId) {
    let mut btf = Btf::new();

    let u8_ty = btf.add_int("unsigned char", 1, false);
    let u16_ty = btf.add_int("short unsigned int", 2, false);
    let u32_ty = btf.add_int("unsigned int", 4, false);
    let u64_ty = btf.add_int("long unsigned int", 8, false);
    let i32_ty = btf.add_int("int", 4, true);
    let be16 = btf.add_typedef("__be16", u16_ty);

    // refcount_t wraps a struct, making it an invalid terminal field.
    let atomic = btf.add_struct(Some("refcount_struct"), 4, vec![member("refs", 0, i32_ty)]);
    let refcount = btf.add_typedef("refcount_t", atomic);

    let ops_ptr = btf.add_pointer(TypeId(0));
    let ns_common = btf.add_struct(
        Some("ns_common"),
        24,
        vec![member("ops", 0, ops_ptr), member("inum", 16, u32_ty)],
    );
    let net = btf.add_struct(Some("net"), 4352, vec![member("ns", 120, ns_common)]);
    let net_ptr = btf.add_pointer(net);

    let possible_net = btf.add_struct(Some("possible_net"), 8, vec![member("net", 0, net_ptr)]);
    let possible_net_t = btf.add_typedef("possible_net_t", possible_net);

    let net_device = btf.add_struct(
        Some("net_device"),
        3200,
        vec![
            member("ifindex", 224, i32_ty),
            member("nd_net", 280, possible_net_t),
        ],
    );
    let net_device_ptr = btf.add_pointer(net_device);

    let dev_union = btf.add_union(
        None,
        8,
        vec![
            member("dev", 0, net_device_ptr),
            member("dev_scratch", 0, u64_ty),
        ],
    );

    let sk_buff = btf.add_struct(
        Some("sk_buff"),
        232,
        vec![
            Member {
                name: None,
                bit_offset: 16 * 8,
                bitfield_size: 0,
                ty: dev_union,
            },
            member("len", 112, u32_ty),
            Member {
                name: Some("pkt_type".to_string()),
                bit_offset: 1026,
                bitfield_size: 3,
                ty: u8_ty,
            },
            member("vlan_tci", 158, u16_ty),
            member("protocol", 180, be16),
            member("users", 220, refcount),
        ],
    );

    let root = btf.add_pointer(sk_buff);
    (btf, root)
}

/// One probe-read hop at `offset`, loading the result into `dst`
fn hop(offset: u32, dst: Reg) -> Vec<Insn> {
    let mut insns = Vec::new();
    if offset != 0 {
        insns.push(Insn::add64_imm(Reg::R3, offset as i32));
    }
    insns.extend([
        Insn::mov64_imm(Reg::R2, 8),
        Insn::mov64_reg(Reg::R1, Reg::R10),
        Insn::add64_imm(Reg::R1, -8),
        Insn::call(Helper::ProbeReadKernel),
        Insn::ldxdw(dst, Reg::R10, -8),
    ]);
    insns
}

fn epilogue() -> Vec<Insn> {
    vec![
        Insn::mov64_imm(Reg::R0, 0).with_symbol(EXIT_FAIL_LABEL),
        Insn::exit().with_symbol(RETURN_LABEL),
    ]
}

fn probe_read_count(insns: &[Insn]) -> usize {
    insns
        .iter()
        .filter(|insn| {
            insn.opcode == opcode::CALL && insn.imm == Helper::ProbeReadKernel as i32
        })
        .count()
}

#[test]
fn test_bare_pointer_test() {
    let (btf, root) = skb_btf();
    let insns = compile(&btf, root, "skb != 0").unwrap();

    let mut expected = vec![
        Insn::mov64_reg(Reg::R3, Reg::R1),
        Insn::mov64_imm(Reg::R0, 1),
        Insn::jne_imm(Reg::R3, 0, RETURN_LABEL),
    ];
    expected.extend(epilogue());
    assert_eq!(insns, expected);
}

#[test]
fn test_bare_name_defaults_to_truthiness() {
    let (btf, root) = skb_btf();
    assert_eq!(
        compile(&btf, root, "skb").unwrap(),
        compile(&btf, root, "skb != 0").unwrap()
    );
}

#[test]
fn test_unsigned_int_field() {
    let (btf, root) = skb_btf();
    let insns = compile(&btf, root, "skb->len > 1024").unwrap();

    let mut expected = vec![Insn::mov64_reg(Reg::R3, Reg::R1)];
    expected.extend(hop(112, Reg::R3));
    expected.extend([
        Insn::lsh64_imm(Reg::R3, 32),
        Insn::rsh64_imm(Reg::R3, 32),
        Insn::mov64_imm(Reg::R0, 1),
        Insn::jgt_imm(Reg::R3, 1024, RETURN_LABEL),
    ]);
    expected.extend(epilogue());
    assert_eq!(insns, expected);
}

#[test]
fn test_u16_field_masks_loaded_value() {
    let (btf, root) = skb_btf();
    let insns = compile(&btf, root, "skb->vlan_tci == 1000").unwrap();

    let mut expected = vec![Insn::mov64_reg(Reg::R3, Reg::R1)];
    expected.extend(hop(158, Reg::R3));
    expected.extend([
        Insn::and64_imm(Reg::R3, 0xffff),
        Insn::mov64_imm(Reg::R0, 1),
        Insn::jeq_imm(Reg::R3, 1000, RETURN_LABEL),
    ]);
    expected.extend(epilogue());
    assert_eq!(insns, expected);
}

#[test]
fn test_big_endian_field_swaps_constant() {
    let (btf, root) = skb_btf();
    let insns = compile(&btf, root, "skb->protocol == 0x0008").unwrap();

    let mut expected = vec![Insn::mov64_reg(Reg::R3, Reg::R1)];
    expected.extend(hop(180, Reg::R3));
    expected.extend([
        Insn::and64_imm(Reg::R3, 0xffff),
        Insn::mov64_imm(Reg::R0, 1),
        // 0x0008 byte-swapped at compile time; no runtime swap instruction.
        Insn::jeq_imm(Reg::R3, 0x0800, RETURN_LABEL),
    ]);
    expected.extend(epilogue());
    assert_eq!(insns, expected);
}

#[test]
fn test_two_hop_chain_null_checks_intermediate_pointer() {
    let (btf, root) = skb_btf();
    // dev is found through the anonymous union at byte 16.
    let insns = compile(&btf, root, "skb->dev->ifindex == 1").unwrap();

    let mut expected = vec![Insn::mov64_reg(Reg::R3, Reg::R1)];
    expected.extend(hop(16, Reg::R3));
    expected.push(Insn::jeq_imm(Reg::R3, 0, EXIT_FAIL_LABEL));
    expected.extend(hop(224, Reg::R3));
    expected.extend([
        Insn::lsh64_imm(Reg::R3, 32),
        Insn::rsh64_imm(Reg::R3, 32),
        Insn::mov64_imm(Reg::R0, 1),
        // ifindex is signed, but equality is encoding-independent.
        Insn::jeq_imm(Reg::R3, 1, RETURN_LABEL),
    ]);
    expected.extend(epilogue());
    assert_eq!(insns, expected);
}

#[test]
fn test_dot_steps_fold_into_hops() {
    let (btf, root) = skb_btf();
    let insns = compile(&btf, root, "skb->dev->nd_net.net->ns.inum == 0xffffedcba987").unwrap();

    // Offsets are [16, 280, 136]: `.net` folds into the nd_net hop and
    // `.inum` into the ns hop.
    let mut expected = vec![Insn::mov64_reg(Reg::R3, Reg::R1)];
    expected.extend(hop(16, Reg::R3));
    expected.push(Insn::jeq_imm(Reg::R3, 0, EXIT_FAIL_LABEL));
    expected.extend(hop(280, Reg::R3));
    expected.push(Insn::jeq_imm(Reg::R3, 0, EXIT_FAIL_LABEL));
    expected.extend(hop(136, Reg::R3));
    expected.extend([
        Insn::lsh64_imm(Reg::R3, 32),
        Insn::rsh64_imm(Reg::R3, 32),
        Insn::mov64_imm(Reg::R0, 1),
        // The u32 terminal masks the constant to its low 32 bits.
        Insn::jeq_imm(Reg::R3, 0xedcba987_u32 as i32, RETURN_LABEL),
    ]);
    expected.extend(epilogue());
    assert_eq!(insns, expected);

    assert_eq!(probe_read_count(&insns), 3);
}

#[test]
fn test_signed_field_ordered_compare_uses_signed_jump() {
    let (btf, root) = skb_btf();
    let insns = compile(&btf, root, "skb->dev->ifindex < 0x10").unwrap();
    assert!(insns
        .iter()
        .any(|insn| insn.opcode == opcode::BPF_JMP | opcode::BPF_JSLT | opcode::BPF_K));
}

#[test]
fn test_char_literal_constant() {
    let (btf, root) = skb_btf();
    let insns = compile(&btf, root, "skb->len == 'a'").unwrap();
    assert!(insns
        .iter()
        .any(|insn| insn.target.as_deref() == Some(RETURN_LABEL) && insn.imm == 97));
}

// ===== negative scenarios =====

#[test]
fn test_unknown_member() {
    let (btf, root) = skb_btf();
    let err = compile(&btf, root, "skb->xxx == 0").unwrap_err();
    assert_eq!(
        err.to_string(),
        "failed to convert expr to access offsets: failed to find member xxx of sk_buff"
    );
}

#[test]
fn test_struct_terminal_field() {
    let (btf, root) = skb_btf();
    let err = compile(&btf, root, "skb->users == 0").unwrap_err();
    assert!(
        err.to_string().starts_with("unexpected type of last field"),
        "{err}"
    );
}

#[test]
fn test_bitfield_terminal_field() {
    let (btf, root) = skb_btf();
    let err = compile(&btf, root, "skb->pkt_type == 0").unwrap_err();
    assert!(
        err.to_string()
            .starts_with("unexpected member access of bitfield"),
        "{err}"
    );
}

#[test]
fn test_arithmetic_operator() {
    let (btf, root) = skb_btf();
    let err = compile(&btf, root, "skb->len * 2").unwrap_err();
    assert!(
        err.to_string()
            .starts_with("failed to convert operator to instructions"),
        "{err}"
    );
}

#[test]
fn test_malformed_right_operand() {
    let (btf, root) = skb_btf();
    let err = compile(&btf, root, "skb->len > 1024x").unwrap_err();
    assert!(
        err.to_string()
            .starts_with("failed to parse right operand as number"),
        "{err}"
    );
}

#[test]
fn test_syntax_error() {
    let (btf, root) = skb_btf();
    let err = compile(&btf, root, "skb->len >").unwrap_err();
    assert!(
        err.to_string().starts_with("failed to parse expression"),
        "{err}"
    );
}

// ===== stream-level properties =====

#[test]
fn test_every_stream_resolves_and_encodes() {
    let (btf, root) = skb_btf();
    let exprs = [
        "skb != 0",
        "skb->len > 1024",
        "skb->vlan_tci == 1000",
        "skb->protocol == 0x0008",
        "skb->dev->ifindex == 1",
        "skb->dev->nd_net.net->ns.inum == 0xffffedcba987",
    ];

    for expr in exprs {
        let mut insns = compile(&btf, root, expr).unwrap();

        // The prologue writes the working register before anything reads it.
        assert_eq!(insns[0], Insn::mov64_reg(Reg::R3, Reg::R1), "{expr}");

        // Every label reference resolves to exactly one labelled instruction.
        resolve_labels(&mut insns).unwrap();

        let bytecode = encode(&insns);
        assert_eq!(bytecode.len(), insns.len() * 8, "{expr}");
    }
}

#[test]
fn test_probe_read_count_matches_hop_count() {
    let (btf, root) = skb_btf();
    let cases = [
        ("skb != 0", 0),
        ("skb->len > 1024", 1),
        ("skb->dev->ifindex == 1", 2),
        ("skb->dev->nd_net.net->ns.inum == 1", 3),
    ];
    for (expr, hops) in cases {
        let insns = compile(&btf, root, expr).unwrap();
        assert_eq!(probe_read_count(&insns), hops, "{expr}");
    }
}

#[test]
fn test_access_splices_into_larger_program() {
    let (btf, root) = skb_btf();
    let result = access(AccessOptions {
        insns: Vec::new(),
        expr: "skb->dev->ifindex",
        btf: &btf,
        root,
        src: Reg::R1,
        dst: Reg::R6,
        exit_label: "drop",
    })
    .unwrap();
    assert!(result.label_used);

    // Close the program the way a caller would: use the value, materialise
    // the failure label, and exit.
    let mut insns = result.insns;
    insns.push(Insn::mov64_reg(Reg::R0, Reg::R6));
    insns.push(Insn::exit());
    insns.push(Insn::mov64_imm(Reg::R0, 0).with_symbol("drop"));
    insns.push(Insn::exit());

    resolve_labels(&mut insns).unwrap();
    let null_check = insns
        .iter()
        .find(|insn| insn.target.as_deref() == Some("drop"))
        .unwrap();
    assert!(null_check.offset > 0);
}

#[test]
fn test_access_unused_label_needs_no_definition() {
    let (btf, root) = skb_btf();
    let result = access(AccessOptions {
        insns: Vec::new(),
        expr: "skb->len",
        btf: &btf,
        root,
        src: Reg::R1,
        dst: Reg::R3,
        exit_label: "drop",
    })
    .unwrap();
    assert!(!result.label_used);

    let mut insns = result.insns;
    insns.push(Insn::exit());
    // No "drop" label anywhere, and nothing references it.
    resolve_labels(&mut insns).unwrap();
}
