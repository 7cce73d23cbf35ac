use poolalloc::{PoolAllocator, TypedAllocator};

fn log_alloc(addr: *mut u8, size: usize) {
    println!("Requested {size} bytes of memory");
    println!("Received this address: {addr:?}");
}

fn main() {
    let allocator = PoolAllocator::new();

    unsafe {
        let addr1 = allocator.allocate(8).unwrap();
        log_alloc(addr1.as_ptr(), 8);

        let addr2 = allocator.allocate(8).unwrap();
        log_alloc(addr2.as_ptr(), 8);

        let addr3 = allocator.allocate(500).unwrap();
        log_alloc(addr3.as_ptr(), 500);

        println!("{:?}", allocator.stats());

        allocator.deallocate(addr1, 8);
        let reused = allocator.allocate(8).unwrap();
        println!("Should be first addr {reused:?}");

        allocator.deallocate(reused, 8);
        allocator.deallocate(addr2, 8);
        allocator.deallocate(addr3, 500);
    }

    let typed = TypedAllocator::<u32, _>::new(&allocator);
    let values = typed.allocate(4).unwrap();
    unsafe {
        for i in 0..4 {
            values.as_ptr().add(i).write(i as u32 * 100);
        }
        println!("Third value: {}", *values.as_ptr().add(2));
        typed.deallocate(values, 4);
    }
}
