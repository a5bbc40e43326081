use kernel_sim::Uniprocessor;
use kernel_sync::{InterruptStatus, Interrupts, IrqGuard, Processor, Semaphore};
use std::sync::Mutex;

#[test]
fn p_consumes_available_permits_without_blocking() {
    kernel_sim::init_from_env();
    let cpu = Uniprocessor::new();
    let sem = Semaphore::new(&cpu, "permits", 2);

    cpu.run(|_| {
        sem.p();
        sem.p();
        assert_eq!(sem.value(), 0);
        assert_eq!(sem.waiters(), 0);
        sem.v();
        sem.v();
    });

    assert_eq!(sem.value(), 2);
    assert_eq!(cpu.context_switches(), 0);
}

#[test]
fn negative_value_counts_blocked_threads() {
    kernel_sim::init_from_env();
    let cpu = Uniprocessor::new();
    let sem = Semaphore::new(&cpu, "gate", 0);

    cpu.run(|kernel| {
        kernel.spawn("a", || sem.p());
        kernel.spawn("b", || sem.p());
        cpu.yield_now();

        assert_eq!(sem.value(), -2);
        assert_eq!(sem.waiters(), 2);

        sem.v();
        assert_eq!(sem.value(), -1);
        assert_eq!(sem.waiters(), 1);
        sem.v();
        assert_eq!(sem.value(), 0);
        assert_eq!(sem.waiters(), 0);
    });
}

#[test]
fn waiters_are_woken_in_fifo_order() {
    kernel_sim::init_from_env();
    let cpu = Uniprocessor::new();
    let gate = Semaphore::new(&cpu, "gate", 0);
    let done = Semaphore::new(&cpu, "done", 0);
    let order = Mutex::new(Vec::new());

    let (gate, done, order) = (&gate, &done, &order);
    cpu.run(|kernel| {
        for name in ["first", "second", "third"] {
            kernel.spawn(name, move || {
                gate.p();
                order.lock().unwrap().push(name);
                done.v();
            });
        }
        cpu.yield_now();
        assert_eq!(gate.waiters(), 3);

        for _ in 0..3 {
            gate.v();
        }
        for _ in 0..3 {
            done.p();
        }
    });

    assert_eq!(*order.lock().unwrap(), ["first", "second", "third"]);
}

#[test]
fn v_does_not_switch_to_the_woken_thread() {
    kernel_sim::init_from_env();
    let cpu = Uniprocessor::new();
    let sem = Semaphore::new(&cpu, "gate", 0);
    let woke = Mutex::new(false);

    cpu.run(|kernel| {
        kernel.spawn("sleeper", || {
            sem.p();
            *woke.lock().unwrap() = true;
        });
        cpu.yield_now();

        sem.v();
        assert!(!*woke.lock().unwrap());
        cpu.yield_now();
        assert!(*woke.lock().unwrap());
    });
}

#[test]
fn v_with_interrupts_disabled_keeps_them_disabled() {
    kernel_sim::init_from_env();
    let cpu = Uniprocessor::new();
    let sem = Semaphore::new(&cpu, "isr", 0);

    cpu.run(|_| {
        let _irq = IrqGuard::new(&cpu);
        sem.v();
        assert_eq!(cpu.status(), InterruptStatus::Off);
    });

    assert_eq!(sem.value(), 1);
}

#[test]
fn p_restores_interrupt_state_after_waking() {
    kernel_sim::init_from_env();
    let cpu = Uniprocessor::new();
    let sem = Semaphore::new(&cpu, "gate", 0);

    cpu.run(|kernel| {
        kernel.spawn("waker", || sem.v());
        sem.p();
        assert_eq!(cpu.status(), InterruptStatus::On);
    });
}

#[test]
fn balanced_p_and_v_between_producer_and_consumer() {
    kernel_sim::init_from_env();
    let cpu = Uniprocessor::new();
    let items = Semaphore::new(&cpu, "items", 0);
    let slots = Semaphore::new(&cpu, "slots", 2);
    let buffer = Mutex::new(Vec::new());

    cpu.run(|kernel| {
        kernel.spawn("producer", || {
            for i in 0..10 {
                slots.p();
                buffer.lock().unwrap().push(i);
                items.v();
            }
        });
        kernel.spawn("consumer", || {
            for _ in 0..10 {
                items.p();
                assert!(buffer.lock().unwrap().len() <= 2);
                buffer.lock().unwrap().remove(0);
                slots.v();
            }
        });
    });

    assert_eq!(items.value(), 0);
    assert_eq!(slots.value(), 2);
    assert!(buffer.lock().unwrap().is_empty());
}
