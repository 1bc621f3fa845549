//! End-to-end tests that assemble small Glulx images by hand and run
//! them through the public `Vm`/`load` API, rather than calling any
//! `pub(crate)` opcode method directly. Each program is laid out with
//! explicit byte offsets in a comment above it so the encoding can be
//! checked against the addressing-mode table by inspection.

use byteorder::{BigEndian, ByteOrder};
use glulx_core::{load, BumpHeap, Fault, InMemorySaveIo, NullHost, StdHostRng, Vm};

const HEADER_LEN: u32 = 36;
const RAMSTART: u32 = 64;
const ENDMEM: u32 = 256;

fn blank_image() -> Vec<u8> {
    let mut data = vec![0u8; ENDMEM as usize];
    data[0..4].copy_from_slice(b"Glul");
    BigEndian::write_u32(&mut data[4..8], 0x0003_0102);
    BigEndian::write_u32(&mut data[8..12], RAMSTART);
    BigEndian::write_u32(&mut data[12..16], RAMSTART);
    BigEndian::write_u32(&mut data[16..20], ENDMEM);
    BigEndian::write_u32(&mut data[20..24], 256);
    BigEndian::write_u32(&mut data[24..28], HEADER_LEN);
    data
}

fn splice(data: &mut [u8], at: u32, bytes: &[u8]) {
    let at = at as usize;
    data[at..at + bytes.len()].copy_from_slice(bytes);
}

fn vm_from(data: Vec<u8>) -> Vm {
    let loaded = load(data, ENDMEM).unwrap();
    Vm::new(
        loaded,
        Box::new(NullHost),
        Box::new(InMemorySaveIo::default()),
        Box::new(StdHostRng::default()),
        Box::new(BumpHeap::new(RAMSTART, ENDMEM)),
    )
    .unwrap()
}

/// `0x24: startfunc header (0xC1, no locals) -> add 3,5 -> mem[0x50] -> quit`
#[test]
fn add_three_and_five_then_halts() {
    let mut data = blank_image();
    splice(&mut data, HEADER_LEN, &[0xC1, 0, 0]);
    let code = HEADER_LEN + 3;
    // add imm(3) imm(5) -> mem(0x50)
    splice(&mut data, code, &[0x10, 0x11, 0x05, 3, 5, 0x50]);
    // quit (2-byte opcode 0x120: 0x80 | (0x120>>8), 0x120 & 0xff)
    splice(&mut data, code + 6, &[0x81, 0x20]);

    let mut vm = vm_from(data);
    vm.run().unwrap();
    assert!(!vm.is_running());
    assert_eq!(vm.mem().read_u32(0x50).unwrap(), 8);
}

/// `div 0x80000000, -1 -> mem[0x60]`: the one division overflow case
/// that must not trap (`original_source/exec.c`'s `perform_div` keeps
/// `INT_MIN / -1` at `INT_MIN` rather than raising SIGFPE-equivalent).
#[test]
fn int_min_divided_by_minus_one_does_not_trap() {
    let mut data = blank_image();
    splice(&mut data, HEADER_LEN, &[0xC1, 0, 0]);
    let code = HEADER_LEN + 3;
    splice(
        &mut data,
        code,
        &[0x13, 0x13, 0x05, 0x80, 0x00, 0x00, 0x00, 0xFF, 0x60],
    );
    splice(&mut data, code + 9, &[0x81, 0x20]);

    let mut vm = vm_from(data);
    vm.run().unwrap();
    assert_eq!(vm.mem().read_u32(0x60).unwrap(), 0x8000_0000);
}

#[test]
fn division_by_zero_is_fatal() {
    let mut data = blank_image();
    splice(&mut data, HEADER_LEN, &[0xC1, 0, 0]);
    let code = HEADER_LEN + 3;
    // div imm(7) imm(0) -> discard
    splice(&mut data, code, &[0x13, 0x11, 0x00, 7, 0]);

    let mut vm = vm_from(data);
    assert_eq!(vm.run(), Err(Fault::DivisionByZero));
}

/// `-7 % 3` takes the sign of the dividend, and a 32-or-more shift
/// count saturates rather than wrapping back around.
#[test]
fn remainder_and_saturating_shift_through_bytecode() {
    let mut data = blank_image();
    splice(&mut data, HEADER_LEN, &[0xC1, 0, 0]);
    let code = HEADER_LEN + 3;
    // mod imm(-7) imm(3) -> mem(0x50)
    splice(&mut data, code, &[0x14, 0x11, 0x05, 0xF9, 3, 0x50]);
    // ushiftr imm(0xFF) imm(40, as 1-byte immediate) -> mem(0x54)
    let after_mod = code + 6;
    splice(&mut data, after_mod, &[0x1E, 0x11, 0x05, 0xFF, 40, 0x54]);
    splice(&mut data, after_mod + 6, &[0x81, 0x20]);

    let mut vm = vm_from(data);
    vm.run().unwrap();
    assert_eq!(vm.mem().read_u32(0x50).unwrap(), (-1i32) as u32);
    assert_eq!(vm.mem().read_u32(0x54).unwrap(), 0);
}

/// A real two-frame call: the start function calls a second function
/// which returns 42; the caller stores that result and halts.
#[test]
fn call_into_a_function_that_returns_a_value() {
    let mut data = blank_image();
    splice(&mut data, HEADER_LEN, &[0xC1, 0, 0]);
    let code = HEADER_LEN + 3; // 39

    // call imm4(func_addr=100) imm0(argc=0) -> mem(0x50)
    splice(
        &mut data,
        code,
        &[0x30, 0x03, 0x05, 0x00, 0x00, 0x00, 0x64, 0x50],
    );
    // quit, right after the call's operands
    splice(&mut data, code + 8, &[0x81, 0x20]);

    // second function at address 100: local-call, no locals, `return 42`
    splice(&mut data, 100, &[0xC1, 0, 0]);
    splice(&mut data, 103, &[0x31, 0x01, 42]);

    let mut vm = vm_from(data);
    vm.run().unwrap();
    assert_eq!(vm.mem().read_u32(0x50).unwrap(), 42);
}

/// `catch` records a token at `mem[0x50]` and immediately performs its
/// own jump into the protected body (`copy`+`call`), exactly like
/// `jump`; a nested call throws back to the token, unwinding straight
/// past the callee's own frame and the intervening `call`, resuming
/// right after `catch`'s operands -- where `quit` sits -- with the
/// thrown value stored at the same address the token came from.
#[test]
fn throw_unwinds_across_an_intervening_call() {
    let mut data = blank_image();
    splice(&mut data, HEADER_LEN, &[0xC1, 0, 0]);
    let code = HEADER_LEN + 3; // 39

    // catch mem(0x50), branch=4 -> jumps to offset 45 (43 + 4 - 2 = 45),
    // the start of the protected body; its call-stub's own resume pc is
    // 43 (right after catch's operands), where `quit` sits.
    splice(&mut data, code, &[0x32, 0x15, 0x50, 4]);
    // quit, sitting at catch's fallthrough/resume address (43); never
    // reached on the first pass, since catch jumps past it.
    splice(&mut data, code + 4, &[0x81, 0x20]);
    // copy mem(0x50) -> stack (pushes the token as call's argument), at 45
    splice(&mut data, code + 6, &[0x40, 0x85, 0x50]);
    // call imm4(func_addr=150) imm(argc=1) -> discard, at 48
    splice(
        &mut data,
        code + 9,
        &[0x30, 0x13, 0x00, 0x00, 0x00, 0x00, 0x96, 1],
    );

    // function at 150: local-call, one 4-byte local (the token),
    // `throw 999, local0`
    splice(&mut data, 150, &[0xC1, 4, 1, 0, 0]);
    splice(&mut data, 155, &[0x33, 0x93, 0x00, 0x00, 0x03, 0xE7, 0]);

    let mut vm = vm_from(data);
    vm.run().unwrap();
    assert!(!vm.is_running());
    assert_eq!(vm.mem().read_u32(0x50).unwrap(), 999);
}

/// `linearsearch key=20 keysize=4 start=200 structsize=8 numstructs=3
/// keyoffset=0 options=0` over a 3-entry table, run through the real
/// dispatch path so the operand binding order (`loads[0..7)` bound
/// positionally to `(key, keysize, start, structsize, numstructs,
/// keyoffset, options)`) is exercised end-to-end, not just called
/// directly with arguments already in the implementation's own order.
#[test]
fn linearsearch_through_dispatch_finds_the_matching_struct() {
    let mut data = blank_image();
    splice(&mut data, HEADER_LEN, &[0xC1, 0, 0]);
    let code = HEADER_LEN + 3; // 39

    // linearsearch (2-byte opcode 0x150: 0x80 | (0x150>>8), 0x150 & 0xff)
    // loads: key=imm1(20) keysize=imm1(4) start=imm2(200) structsize=imm1(8)
    // numstructs=imm1(3) keyoffset=const(0) options=const(0); store mem(0x50)
    splice(
        &mut data,
        code,
        &[
            0x81, 0x50, // opcode
            0x11, 0x12, 0x01, 0x50, // mode nibbles
            20, 4, 0x00, 0xC8, 8, 3, 0x50, // key, keysize, start(2B), structsize, numstructs, store addr
        ],
    );
    splice(&mut data, code + 13, &[0x81, 0x20]); // quit

    // table of (key:u32, payload:u32) pairs at offset 200
    for (i, &(k, p)) in [(10u32, 100u32), (20, 200), (30, 300)].iter().enumerate() {
        let addr = 200 + i as u32 * 8;
        splice(&mut data, addr, &k.to_be_bytes());
        splice(&mut data, addr + 4, &p.to_be_bytes());
    }

    let mut vm = vm_from(data);
    vm.run().unwrap();
    assert_eq!(vm.mem().read_u32(0x50).unwrap(), 208);
}
