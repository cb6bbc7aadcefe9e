#![no_main]
#![no_std]

#[panic_handler]
fn panic(_info: &core::panic::PanicInfo) -> ! {
    // Safety: The unimp instruction is guaranteed to trap
    unsafe {
        core::arch::asm!("unimp");
        core::hint::unreachable_unchecked();
    }
}

/// Status returned by every invocation.
const RESULT_CODE: i32 = 12;

/// Entry point looked up by the host. The call data at `args_ptr` is ignored.
#[no_mangle]
#[polkavm_derive::polkavm_export]
pub extern "C" fn main(_args_ptr: u32, _args_len: u32) -> i32 {
    RESULT_CODE
}
