#![no_main]
use asar_rs::{compute_integrity, Namespace};
use libfuzzer_sys::{arbitrary::{Arbitrary, Unstructured}, fuzz_target};

#[derive(Debug, Arbitrary)]
enum Op {
    Dir { path: String, unpack: bool },
    File { path: String, size: u32, unpack: bool },
    Link { path: String, target: String },
    Lookup { path: String, follow: bool },
}

fuzz_target!(|input: &[u8]| {
    let mut u = Unstructured::new(input);
    let ops: Vec<Op> = match u.arbitrary() {
        Ok(ops) => ops,
        Err(_) => return,
    };

    let empty = match compute_integrity(&b""[..]) {
        Ok(i) => i,
        Err(_) => return,
    };
    let mut ns = Namespace::new();
    for op in ops.iter().take(64) {
        match op {
            Op::Dir { path, unpack } => {
                ns.ensure_directory(path, *unpack);
            }
            Op::File { path, size, unpack } => {
                let _ = ns.insert_file(path, u64::from(*size), false, empty.clone(), *unpack);
            }
            Op::Link { path, target } => {
                let _ = ns.insert_link(path, target, false);
            }
            Op::Lookup { path, follow } => {
                let _ = ns.lookup(path, *follow);
            }
        }
    }

    // whatever was built must survive its own header
    if let Ok(json) = ns.to_json() {
        assert!(Namespace::from_json(&json).is_ok());
    }
});
