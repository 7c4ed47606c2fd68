#![no_main]
use libfuzzer_sys::fuzz_target;
use rtmem_core::GrowPolicy;
use rtmem_core::mem::grow::plan_capacity;

fuzz_target!(|data: &[u8]| {
    if data.len() < 4 {
        return;
    }
    let policy = GrowPolicy {
        initial_bytes: usize::from(data[0]).max(1),
        maximum_bytes: usize::from(u16::from_le_bytes([data[1], data[2]])).max(256),
    };
    if policy.validate().is_err() {
        return;
    }
    let element_size = usize::from(data[3] % 16) + 1;
    let mut allocated = 0;
    for chunk in data[4..].chunks(2) {
        let target = usize::from(chunk[0]) * usize::from(chunk.get(1).copied().unwrap_or(1));
        match plan_capacity(&policy, allocated, target, element_size) {
            Ok(capacity) => {
                assert!(capacity >= allocated);
                assert!(capacity <= policy.maximum_bytes);
                assert!(target <= capacity / element_size);
                allocated = capacity;
            }
            Err(_) => assert!(target > policy.maximum_bytes / element_size),
        }
    }
});
