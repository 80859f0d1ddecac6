use kernel_sync::{InterruptControl, IrqGuard, SoftInterrupts};

#[test]
fn guard_masks_and_restores() {
    let irq = SoftInterrupts::new();
    assert!(irq.enabled());
    {
        let g = IrqGuard::new(&irq);
        assert!(g.were_enabled());
        assert!(!irq.enabled());
    }
    assert!(irq.enabled());
    assert_eq!(irq.times_masked(), 1);
}

#[test]
fn nested_guards_only_outermost_reenables() {
    let irq = SoftInterrupts::new();
    let outer = IrqGuard::new(&irq);
    {
        let inner = IrqGuard::new(&irq);
        assert!(!inner.were_enabled());
    }
    assert!(!irq.enabled(), "inner guard must not re-enable interrupts");
    drop(outer);
    assert!(irq.enabled());
    assert_eq!(irq.times_masked(), 1);
}

#[test]
fn early_return_restores_state() {
    fn critical(irq: &SoftInterrupts, bail: bool) -> Result<(), ()> {
        let _g = IrqGuard::new(irq);
        if bail {
            return Err(());
        }
        Ok(())
    }

    let irq = SoftInterrupts::new();
    assert!(critical(&irq, true).is_err());
    assert!(irq.enabled());
    assert!(critical(&irq, false).is_ok());
    assert!(irq.enabled());
}

#[test]
fn guard_works_through_trait_objects() {
    let irq = SoftInterrupts::new();
    let dynamic: &dyn InterruptControl = &irq;
    {
        let _g = IrqGuard::new(dynamic);
        assert!(!dynamic.enabled());
    }
    assert!(dynamic.enabled());
}
