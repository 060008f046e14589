#![no_main]

use libfuzzer_sys::fuzz_target;
use classweave::classfile::{ClassFile, MethodBody};

fuzz_target!(|data: &[u8]| {
    let Ok(class) = ClassFile::parse(data) else {
        return;
    };
    for slot in 0..class.methods().len() {
        if let Ok(Some(code)) = class.code(slot) {
            if let Ok(body) = MethodBody::decode(&code, class.constant_pool()) {
                let _ = body.encode();
            }
        }
    }
});
