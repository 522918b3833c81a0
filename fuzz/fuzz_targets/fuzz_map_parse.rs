#![no_main]

use libfuzzer_sys::fuzz_target;
use mazefuzz::{ActionSequence, MapSpec};

fuzz_target!(|text: &str| {
    if let Ok(map) = MapSpec::parse(text) {
        // Anything that parses must survive a render/parse cycle unchanged
        let reparsed = MapSpec::parse(&map.render()).expect("rendered map failed to parse");
        assert_eq!(reparsed, map);
        assert_eq!(
            map.cells().len(),
            usize::from(map.width()) * usize::from(map.height())
        );
    }

    if let Ok(actions) = ActionSequence::parse(text) {
        let reparsed = ActionSequence::parse(&actions.render()).expect("rendered actions failed to parse");
        assert_eq!(reparsed, actions);
    }
});
