//! Connecting ports of adjacent modules.

use crate::core::error::CoreResult;
use crate::core::types::PortId;
use crate::graph::connection::{Connection, Endpoint};
use crate::module::Module;

/// Connect input `input` of `downstream` to output `output` of `upstream`.
///
/// The returned connection names the input id actually bound, which differs
/// from `input` when a fan-out port grows.
pub fn connect_ports(
    upstream: &dyn Module,
    output: PortId,
    downstream: &mut dyn Module,
    input: PortId,
) -> CoreResult<Connection> {
    let source = upstream.outputs().get(output)?.source();
    let bound = downstream.inputs_mut().connect(input, &source)?;
    let connection = Connection::new(
        Endpoint::output(upstream.id(), output),
        Endpoint::input(downstream.id(), bound),
    );
    log::debug!(
        "Connected {}.{} to {}.{} ({})",
        upstream.name(),
        output,
        downstream.name(),
        bound,
        connection
    );
    Ok(connection)
}

/// Connect every input of `downstream` to the output of `upstream` with the
/// same id, in id order. Inputs without a matching output stay unbound.
pub fn connect_matching_ids(upstream: &dyn Module, downstream: &mut dyn Module) -> CoreResult<Vec<Connection>> {
    let ids: Vec<PortId> = downstream
        .inputs()
        .ids()
        .filter(|id| upstream.outputs().contains(*id))
        .collect();
    ids.into_iter()
        .map(|id| connect_ports(upstream, id, &mut *downstream, id))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::CoreError;
    use crate::core::parameter::ConfigDocument;
    use crate::core::types::{PortDirection, TypeTag};
    use crate::testing::{FakeModule, FAN_OUT_PORT};
    use serde_json::json;

    fn config(width: u32, height: u32) -> ConfigDocument {
        let mut config = ConfigDocument::new();
        config.insert("width".to_string(), json!(width));
        config.insert("height".to_string(), json!(height));
        config
    }

    fn module(name: &str) -> FakeModule {
        FakeModule::new(name, &config(8, 6)).unwrap()
    }

    #[test]
    fn test_connect_ports() {
        let a = module("a");
        let mut b = module("b");
        let connection = connect_ports(&a, 4, &mut b, 4).unwrap();
        assert_eq!(connection.from, Endpoint::output(a.id(), 4));
        assert_eq!(connection.to, Endpoint::input(b.id(), 4));
        assert!(b.inputs().get(4).unwrap().is_connected());
        assert!(a.outputs().get(4).unwrap().is_connected());

        let err = connect_ports(&a, 4, &mut b, 4).unwrap_err();
        assert!(matches!(err, CoreError::UnsupportedOperation { operation: "reconnect", .. }));
    }

    #[test]
    fn test_missing_ports() {
        let a = module("a");
        let mut b = module("b");
        assert!(matches!(
            connect_ports(&a, 42, &mut b, 0),
            Err(CoreError::NotFound { direction: PortDirection::Output, id: 42 })
        ));
        assert!(matches!(
            connect_ports(&a, 0, &mut b, 42),
            Err(CoreError::NotFound { direction: PortDirection::Input, id: 42 })
        ));
    }

    #[test]
    fn test_type_mismatch_between_modules() {
        let a = module("a");
        let mut b = module("b");
        let err = connect_ports(&a, 0, &mut b, 4).unwrap_err();
        assert!(matches!(
            err,
            CoreError::TypeMismatch { expected: TypeTag::Double, found: TypeTag::Boolean, .. }
        ));
        assert!(!b.inputs().get(4).unwrap().is_connected());
        assert!(!a.outputs().get(0).unwrap().is_connected());
    }

    #[test]
    fn test_images_are_rescaled_between_resolutions() {
        let mut a = FakeModule::new("a", &config(8, 6)).unwrap();
        let mut b = FakeModule::new("b", &config(16, 12)).unwrap();
        let mut c = FakeModule::new("c", &config(4, 3)).unwrap();
        connect_ports(&a, 5, &mut b, 5).unwrap();
        connect_ports(&b, 5, &mut c, 5).unwrap();

        let mut seed = 21;
        for _ in 0..3 {
            a.process_random_input(&mut seed).unwrap();
            b.convert_inputs().unwrap();
            b.process_frame().unwrap();
            c.convert_inputs().unwrap();
            c.process_frame().unwrap();
        }
        let inside = |m: &FakeModule, x: i32, y: i32| m.inputs().get(5).unwrap().query(x, y) != "out of image";
        assert!(inside(&b, 15, 11));
        assert!(!inside(&b, 16, 0));
        assert!(inside(&c, 3, 2));
        assert!(!inside(&c, 4, 0));
        assert_eq!(c.inputs().get(5).unwrap().time_stamp(), 3);
    }

    #[test]
    fn test_fan_out_ids_are_contiguous() {
        let producers: Vec<FakeModule> = (0..5).map(|i| module(&format!("p{}", i))).collect();
        let mut sink = module("sink");
        let capacity = sink.inputs().get(FAN_OUT_PORT).unwrap().capacity();
        assert_eq!(capacity, 4);

        let bound: Vec<PortId> = producers[..capacity]
            .iter()
            .map(|p| connect_ports(p, 1, &mut sink, FAN_OUT_PORT).unwrap().to.port)
            .collect();
        let expected: Vec<PortId> = (FAN_OUT_PORT..FAN_OUT_PORT + capacity as PortId).collect();
        assert_eq!(bound, expected);

        let err = connect_ports(&producers[capacity], 1, &mut sink, FAN_OUT_PORT).unwrap_err();
        assert!(matches!(err, CoreError::CapacityExceeded { capacity: 4, .. }));

        for (i, id) in expected.iter().enumerate() {
            let port = sink.inputs().get(*id).unwrap();
            assert_eq!(port.name(), "fan");
            assert_eq!(port.producer().map(|s| s.module()), Some(producers[i].id()));
        }
        assert!(sink.convert_inputs().is_ok());
    }

    #[test]
    fn test_disconnect_fan_out_port_fails() {
        let a = module("a");
        let mut b = module("b");
        connect_ports(&a, 1, &mut b, FAN_OUT_PORT).unwrap();
        let err = b.inputs_mut().get_mut(FAN_OUT_PORT).unwrap().disconnect().unwrap_err();
        assert!(matches!(err, CoreError::UnsupportedOperation { operation: "disconnect", .. }));
    }

    #[test]
    fn test_chain_is_stable_over_many_steps() {
        let mut a = module("a");
        let mut b = module("b");
        let mut c = module("c");
        let ab = connect_matching_ids(&a, &mut b).unwrap();
        let bc = connect_matching_ids(&b, &mut c).unwrap();
        assert_eq!(ab.len(), 9);
        assert_eq!(bc.len(), 9);

        let tags: Vec<TypeTag> = c.inputs().iter().map(|(_, s)| s.type_tag()).collect();
        let mut seed = 1234;
        for step in 1..=100u64 {
            a.process_random_input(&mut seed).unwrap();
            b.convert_inputs().unwrap();
            b.process_frame().unwrap();
            c.convert_inputs().unwrap();
            c.process_frame().unwrap();

            for id in [0, 1, 2, 3, 4, 6, 7, FAN_OUT_PORT] {
                let upstream = a.outputs().get(id).unwrap().value().unwrap();
                assert_eq!(b.inputs().get(id).unwrap().value().unwrap(), upstream);
                assert_eq!(c.inputs().get(id).unwrap().value().unwrap(), upstream);
            }
            assert_eq!(c.inputs().get(0).unwrap().time_stamp(), step);
        }
        let after: Vec<TypeTag> = c.inputs().iter().map(|(_, s)| s.type_tag()).collect();
        assert_eq!(tags, after);
        assert_eq!(c.frames(), 100);
    }

    #[test]
    fn test_consumers_see_previous_step_until_converted() {
        let mut a = module("a");
        let mut b = module("b");
        connect_matching_ids(&a, &mut b).unwrap();

        let mut seed = 8;
        a.process_random_input(&mut seed).unwrap();
        b.convert_inputs().unwrap();
        let seen = b.inputs().get(4).unwrap().value().unwrap();

        a.process_random_input(&mut seed).unwrap();
        assert_eq!(b.inputs().get(4).unwrap().value().unwrap(), seen);
        b.convert_inputs().unwrap();
        assert_eq!(
            b.inputs().get(4).unwrap().value().unwrap(),
            a.outputs().get(4).unwrap().value().unwrap()
        );
    }
}
