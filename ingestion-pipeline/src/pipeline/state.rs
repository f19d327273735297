use state_machines::state_machine;

// Failures leave the typed machine behind; the document itself records `error`.
state_machine! {
    name: IngestionMachine,
    state: IngestionState,
    initial: Queued,
    states: [Queued, Extracted, Analyzed, Applied],
    events {
        extract { transition: { from: Queued, to: Extracted } }
        analyze { transition: { from: Extracted, to: Analyzed } }
        apply { transition: { from: Analyzed, to: Applied } }
    }
}

pub fn queued() -> IngestionMachine<(), Queued> {
    IngestionMachine::new(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stages_advance_in_order() {
        let extracted = queued().extract().map_err(|_| "extract").expect("extract");
        let analyzed = extracted.analyze().map_err(|_| "analyze").expect("analyze");
        assert!(analyzed.apply().is_ok());
    }
}
