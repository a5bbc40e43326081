use kernel_sim::{ThreadStatus, Uniprocessor};
use kernel_sync::{InterruptStatus, Interrupts, IrqGuard, Processor};
use std::sync::Mutex;

#[test]
fn spawned_threads_run_in_fifo_order_when_main_yields() {
    kernel_sim::init_from_env();
    let cpu = Uniprocessor::new();
    let order = Mutex::new(Vec::new());

    let order_ref = &order;
    cpu.run(|kernel| {
        for name in ["a", "b", "c"] {
            kernel.spawn(name, move || order_ref.lock().unwrap().push(name));
        }
        assert!(order_ref.lock().unwrap().is_empty());
        cpu.yield_now();
        order_ref.lock().unwrap().push("main");
    });

    assert_eq!(*order.lock().unwrap(), ["a", "b", "c", "main"]);
}

#[test]
fn yield_without_other_threads_returns_immediately() {
    kernel_sim::init_from_env();
    let cpu = Uniprocessor::new();
    cpu.run(|_| {
        let me = cpu.current_thread();
        cpu.yield_now();
        assert_eq!(cpu.current_thread(), me);
    });
    assert_eq!(cpu.context_switches(), 0);
}

#[test]
fn interrupt_state_is_saved_per_thread() {
    kernel_sim::init_from_env();
    let cpu = Uniprocessor::new();

    cpu.run(|kernel| {
        kernel.spawn("masked", || {
            let _irq = IrqGuard::new(&cpu);
            cpu.yield_now();
            assert_eq!(cpu.status(), InterruptStatus::Off);
        });
        cpu.yield_now();
        // "masked" is switched out with interrupts off; ours are still on.
        assert_eq!(cpu.status(), InterruptStatus::On);
        cpu.yield_now();
    });
}

#[test]
fn sleep_and_ready_to_run() {
    kernel_sim::init_from_env();
    let cpu = Uniprocessor::new();
    let sleeper = Mutex::new(None);

    cpu.run(|kernel| {
        let id = kernel.spawn("sleeper", || {
            let _irq = IrqGuard::new(&cpu);
            cpu.sleep();
        });
        *sleeper.lock().unwrap() = Some(id);
        assert_eq!(cpu.thread_status(id), ThreadStatus::Ready);
        assert_eq!(cpu.thread_name(id), "sleeper");

        cpu.yield_now();
        assert_eq!(cpu.thread_status(id), ThreadStatus::Blocked);

        {
            let _irq = IrqGuard::new(&cpu);
            cpu.ready_to_run(id);
        }
        assert_eq!(cpu.thread_status(id), ThreadStatus::Ready);
        cpu.yield_now();
        assert_eq!(cpu.thread_status(id), ThreadStatus::Finished);
    });

    let id = sleeper.lock().unwrap().expect("sleeper spawned");
    assert_eq!(cpu.thread_status(id), ThreadStatus::Finished);
}

#[test]
#[should_panic(expected = "deadlock")]
fn sleeping_with_nothing_runnable_is_a_deadlock() {
    kernel_sim::init_from_env();
    let cpu = Uniprocessor::new();
    cpu.run(|_| {
        let _irq = IrqGuard::new(&cpu);
        cpu.sleep();
    });
}

#[test]
#[should_panic(expected = "simulated processor halted")]
fn panicking_thread_halts_the_processor() {
    kernel_sim::init_from_env();
    let cpu = Uniprocessor::new();
    cpu.run(|kernel| {
        kernel.spawn("faulty", || panic!("boom"));
        cpu.yield_now();
        unreachable!("main must not be rescheduled after a halt");
    });
}

#[test]
#[should_panic(expected = "interrupts enabled")]
fn sleep_requires_interrupts_off() {
    kernel_sim::init_from_env();
    let cpu = Uniprocessor::new();
    cpu.run(|_| cpu.sleep());
}
