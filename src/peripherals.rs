//! Guest-side peripheral bindings (`board`, `digitalio`, `analogio`,
//! `busio`): the native half of §4.3's "guest peripheral bindings write
//! here". These are the modules CircuitPython-style user code imports to
//! touch the virtual hardware plane — `board.D13`, `digitalio.DigitalInOut`,
//! `led.value = True` (scenarios S3/S4).
//!
//! Each module is built the same way: a handful of native closures over the
//! shared `Rc<RefCell<HardwarePlane>>` are installed as module globals, then
//! a short Python class body is compiled against those globals so attribute
//! access (`obj.value = True`) goes through ordinary `property` descriptors
//! instead of a bespoke native class per peripheral. The pattern mirrors
//! `register_host_module`'s own module-as-dict construction in
//! `interpreter_adapter.rs`.

use cpyhost_hwplane::bus::BusKind;
use cpyhost_hwplane::pin::{Direction, Pull};
use cpyhost_hwplane::HardwarePlane;
use rustpython_vm::builtins::PyDict;
use rustpython_vm::scope::Scope;
use rustpython_vm::{compiler::Mode, PyObjectRef, PyResult, VirtualMachine};
use std::cell::RefCell;
use std::rc::Rc;

/// Installs `board`, `digitalio`, `analogio` and `busio` into `sys.modules`
/// (§4.1 "board-level peripheral wiring"). Called once, from
/// `RustPythonInterpreter::new`, before any user code can import them.
pub fn install(vm: &VirtualMachine, hw: Rc<RefCell<HardwarePlane>>) {
    let board = install_board(vm);
    let digitalio = install_digitalio(vm, hw.clone());
    let analogio = install_analogio(vm, hw.clone());
    let busio = install_busio(vm, hw);
    register_in_sys_modules(vm, &[("board", board), ("digitalio", digitalio), ("analogio", analogio), ("busio", busio)]);
}

fn register_in_sys_modules(vm: &VirtualMachine, modules: &[(&str, PyObjectRef)]) {
    let sys_modules = vm
        .sys_module
        .get_attr("modules", vm)
        .expect("sys.modules always exists");
    let modules_dict = sys_modules
        .downcast::<PyDict>()
        .expect("sys.modules is a dict");
    for (name, module) in modules {
        modules_dict
            .set_item(*name, module.clone(), vm)
            .expect("sys.modules is writable during bootstrap");
    }
}

/// Runs `source` with `globals` as both globals and locals, panicking on any
/// compile/exec error — these scripts are fixed internal bootstrap code, not
/// user input, so a failure here is a bug in this file, not a guest error.
fn run_glue(vm: &VirtualMachine, globals: rustpython_vm::PyRef<PyDict>, module_name: &str, source: &str) {
    let code = vm
        .compile(source, Mode::Exec, format!("<{module_name}>"))
        .unwrap_or_else(|e| panic!("{module_name} glue failed to compile: {e}"));
    let scope = Scope::with_builtins(None, globals, vm);
    vm.run_code_obj(code, scope)
        .unwrap_or_else(|e| panic!("{module_name} glue raised during install: {}", vm.to_str(&e.into()).map(|s| s.as_str().to_string()).unwrap_or_default()));
}

fn new_module_dict(vm: &VirtualMachine) -> rustpython_vm::PyRef<PyDict> {
    vm.ctx.new_dict()
}

// ---------------------------------------------------------------------
// board: pin-number constants only. A real board definition file is a
// per-board artifact out of scope here (§1 "any physical device driver");
// this is the fixed virtual board the hardware plane always presents: 64
// digital-capable pins `D0`..`D63`, with `A0`..`A5` aliasing the last six as
// analog-capable (so `digitalio` and `analogio` can address the same pin
// record from either module, matching real CircuitPython board modules that
// alias analog and digital names onto the same underlying pin).
// ---------------------------------------------------------------------

fn install_board(vm: &VirtualMachine) -> PyObjectRef {
    let dict = new_module_dict(vm);
    for pin in 0..cpyhost_hwplane::layout::PIN_COUNT {
        let name = format!("D{pin}");
        dict.set_item(name.as_str(), vm.ctx.new_int(pin as i64).into(), vm)
            .expect("board dict is writable");
    }
    const ANALOG_COUNT: usize = 6;
    let analog_base = cpyhost_hwplane::layout::PIN_COUNT - ANALOG_COUNT;
    for i in 0..ANALOG_COUNT {
        let name = format!("A{i}");
        dict.set_item(name.as_str(), vm.ctx.new_int((analog_base + i) as i64).into(), vm)
            .expect("board dict is writable");
    }
    vm.new_module("board", dict, None).into()
}

// ---------------------------------------------------------------------
// digitalio
// ---------------------------------------------------------------------

const DIGITALIO_GLUE: &str = r#"
class Direction:
    INPUT = 0
    OUTPUT = 1

class Pull:
    NONE = 0
    UP = 1
    DOWN = 2

class DriveMode:
    PUSH_PULL = 0
    OPEN_DRAIN = 1

class DigitalInOut:
    def __init__(self, pin):
        self._pin = pin
        _claim(pin)
        self._direction = Direction.INPUT
        _set_direction(pin, Direction.INPUT)

    def deinit(self):
        _release(self._pin)

    def switch_to_output(self, value=False, drive_mode=DriveMode.PUSH_PULL):
        self.direction = Direction.OUTPUT
        _set_drive(self._pin, drive_mode)
        self.value = value

    def switch_to_input(self, pull=None):
        self.direction = Direction.INPUT
        self.pull = pull

    @property
    def direction(self):
        return _get_direction(self._pin)

    @direction.setter
    def direction(self, value):
        self._direction = value
        _set_direction(self._pin, value)

    @property
    def value(self):
        if self._direction == Direction.OUTPUT:
            return _get_output_value(self._pin)
        return _get_input_value(self._pin)

    @value.setter
    def value(self, new_value):
        if self._direction != Direction.OUTPUT:
            raise AttributeError("cannot set value on an input pin")
        _set_output_value(self._pin, new_value)

    @property
    def pull(self):
        return _get_pull(self._pin)

    @pull.setter
    def pull(self, new_pull):
        _set_pull(self._pin, Pull.NONE if new_pull is None else new_pull)

    @property
    def drive_mode(self):
        return DriveMode.PUSH_PULL

    @drive_mode.setter
    def drive_mode(self, mode):
        _set_drive(self._pin, mode)
"#;

fn install_digitalio(vm: &VirtualMachine, hw: Rc<RefCell<HardwarePlane>>) -> PyObjectRef {
    let dict = new_module_dict(vm);

    let claim_hw = hw.clone();
    let claim = vm.new_function("_claim", move |pin: usize| {
        claim_hw.borrow_mut().guest_claim(pin);
    });
    dict.set_item("_claim", claim.into(), vm).expect("peripheral module dict is writable during bootstrap");

    let release_hw = hw.clone();
    let release = vm.new_function("_release", move |pin: usize| {
        release_hw.borrow_mut().guest_release(pin);
    });
    dict.set_item("_release", release.into(), vm).expect("peripheral module dict is writable during bootstrap");

    let set_dir_hw = hw.clone();
    let set_direction = vm.new_function("_set_direction", move |pin: usize, value: i32| {
        let direction = if value == Direction::Output as i32 {
            Direction::Output
        } else {
            Direction::Input
        };
        set_dir_hw.borrow_mut().guest_set_direction(pin, direction);
    });
    dict.set_item("_set_direction", set_direction.into(), vm).expect("peripheral module dict is writable during bootstrap");

    let get_dir_hw = hw.clone();
    let get_direction = vm.new_function("_get_direction", move |pin: usize| -> i32 {
        get_dir_hw.borrow().guest_direction(pin) as i32
    });
    dict.set_item("_get_direction", get_direction.into(), vm).expect("peripheral module dict is writable during bootstrap");

    let set_pull_hw = hw.clone();
    let set_pull = vm.new_function("_set_pull", move |pin: usize, value: i32| {
        let pull = match value {
            1 => Pull::Up,
            2 => Pull::Down,
            _ => Pull::None,
        };
        set_pull_hw.borrow_mut().guest_set_pull(pin, pull);
    });
    dict.set_item("_set_pull", set_pull.into(), vm).expect("peripheral module dict is writable during bootstrap");

    let get_pull_hw = hw.clone();
    let get_pull = vm.new_function("_get_pull", move |pin: usize| -> i32 {
        get_pull_hw.borrow().guest_pull(pin) as i32
    });
    dict.set_item("_get_pull", get_pull.into(), vm).expect("peripheral module dict is writable during bootstrap");

    let set_drive_hw = hw.clone();
    let set_drive = vm.new_function("_set_drive", move |pin: usize, value: i32| {
        let drive = if value == 1 {
            cpyhost_hwplane::pin::Drive::OpenDrain
        } else {
            cpyhost_hwplane::pin::Drive::PushPull
        };
        set_drive_hw.borrow_mut().guest_set_drive(pin, drive);
    });
    dict.set_item("_set_drive", set_drive.into(), vm).expect("peripheral module dict is writable during bootstrap");

    let set_out_hw = hw.clone();
    let set_output_value = vm.new_function("_set_output_value", move |pin: usize, value: bool| {
        set_out_hw.borrow_mut().guest_set_output_value(pin, value);
    });
    dict.set_item("_set_output_value", set_output_value.into(), vm).expect("peripheral module dict is writable during bootstrap");

    let get_out_hw = hw.clone();
    let get_output_value = vm.new_function("_get_output_value", move |pin: usize| -> bool {
        get_out_hw.borrow().output_value(pin)
    });
    dict.set_item("_get_output_value", get_output_value.into(), vm).expect("peripheral module dict is writable during bootstrap");

    let get_in_hw = hw;
    let get_input_value = vm.new_function("_get_input_value", move |pin: usize| -> bool {
        get_in_hw.borrow().input_value(pin)
    });
    dict.set_item("_get_input_value", get_input_value.into(), vm).expect("peripheral module dict is writable during bootstrap");

    run_glue(vm, dict.clone(), "digitalio", DIGITALIO_GLUE);
    vm.new_module("digitalio", dict, None).into()
}

// ---------------------------------------------------------------------
// analogio: `AnalogIn` (ADC, read-only) / `AnalogOut` (DAC, write-only),
// §3 "analog_value ... analog_is_output (input = ADC, output = DAC)".
// ---------------------------------------------------------------------

const ANALOGIO_GLUE: &str = r#"
class AnalogIn:
    def __init__(self, pin):
        self._pin = pin
        _set_is_output(pin, False)

    def deinit(self):
        pass

    @property
    def value(self):
        return _get_value(self._pin)

    @property
    def reference_voltage(self):
        return 3.3

class AnalogOut:
    def __init__(self, pin):
        self._pin = pin
        _set_is_output(pin, True)

    def deinit(self):
        pass

    @property
    def value(self):
        return _get_value(self._pin)

    @value.setter
    def value(self, new_value):
        _set_value(self._pin, new_value)
"#;

fn install_analogio(vm: &VirtualMachine, hw: Rc<RefCell<HardwarePlane>>) -> PyObjectRef {
    let dict = new_module_dict(vm);

    let set_is_output_hw = hw.clone();
    let set_is_output = vm.new_function("_set_is_output", move |pin: usize, is_output: bool| {
        set_is_output_hw.borrow_mut().guest_set_analog_is_output(pin, is_output);
    });
    dict.set_item("_set_is_output", set_is_output.into(), vm).expect("peripheral module dict is writable during bootstrap");

    let get_value_hw = hw.clone();
    // 16-bit ADC/DAC register value (§6 "analog value (16-bit little-endian)").
    let get_value = vm.new_function("_get_value", move |pin: usize| -> i64 {
        get_value_hw.borrow().analog_output_value(pin) as i64
    });
    dict.set_item("_get_value", get_value.into(), vm).expect("peripheral module dict is writable during bootstrap");

    let set_value_hw = hw;
    let set_value = vm.new_function("_set_value", move |pin: usize, value: i64| {
        let clamped = value.clamp(0, u16::MAX as i64) as u16;
        set_value_hw.borrow_mut().guest_set_analog_output_value(pin, clamped);
    });
    dict.set_item("_set_value", set_value.into(), vm).expect("peripheral module dict is writable during bootstrap");

    run_glue(vm, dict.clone(), "analogio", ANALOGIO_GLUE);
    vm.new_module("analogio", dict, None).into()
}

// ---------------------------------------------------------------------
// busio: minimal I2C/SPI/UART surface over the bus banks. Endpoint pins
// pick (or create) the bus slot (§3 "a bus is found by its endpoint
// tuple"); `try_lock`/`unlock` are advisory (§5 "Bus locking").
// ---------------------------------------------------------------------

const BUSIO_GLUE: &str = r#"
class I2C:
    def __init__(self, scl, sda, frequency=400000):
        self._index = _i2c_find_or_create([scl, sda])
        _i2c_set_frequency(self._index, frequency)

    def deinit(self):
        _i2c_unlock(self._index)

    def try_lock(self):
        return _i2c_try_lock(self._index)

    def unlock(self):
        _i2c_unlock(self._index)

    def writeto(self, address, buffer):
        _i2c_write(self._index, address, bytes(buffer))

    def readfrom_into(self, address, buffer):
        data = _i2c_read(self._index, address, len(buffer))
        for i in range(len(data)):
            buffer[i] = data[i]

class SPI:
    def __init__(self, clock, mosi=None, miso=None):
        endpoints = [clock]
        if mosi is not None:
            endpoints.append(mosi)
        if miso is not None:
            endpoints.append(miso)
        self._index = _spi_find_or_create(endpoints)

    def deinit(self):
        _spi_unlock(self._index)

    def try_lock(self):
        return _spi_try_lock(self._index)

    def unlock(self):
        _spi_unlock(self._index)

    def configure(self, baudrate=100000, polarity=0, phase=0, bits=8):
        _spi_set_frequency(self._index, baudrate)

class UART:
    def __init__(self, tx, rx, baudrate=9600):
        self._index = _uart_find_or_create([tx, rx])
        _uart_set_frequency(self._index, baudrate)

    def deinit(self):
        pass
"#;

fn install_busio(vm: &VirtualMachine, hw: Rc<RefCell<HardwarePlane>>) -> PyObjectRef {
    let dict = new_module_dict(vm);
    install_bus_kind(vm, &dict, hw.clone(), BusKind::I2c, "i2c");
    install_bus_kind(vm, &dict, hw.clone(), BusKind::Spi, "spi");
    install_bus_kind(vm, &dict, hw.clone(), BusKind::Uart, "uart");
    install_i2c_transfer(vm, &dict, hw);

    run_glue(vm, dict.clone(), "busio", BUSIO_GLUE);
    vm.new_module("busio", dict, None).into()
}

/// Registers `_{kind}_find_or_create`, `_{kind}_try_lock`, `_{kind}_unlock`
/// and `_{kind}_set_frequency` for one bus kind. `find_or_create` takes a
/// Python list of endpoint pin numbers so the glue script can build it from
/// a variable-length argument list before calling in.
fn install_bus_kind(
    vm: &VirtualMachine,
    dict: &rustpython_vm::PyRef<PyDict>,
    hw: Rc<RefCell<HardwarePlane>>,
    kind: BusKind,
    label: &str,
) {
    let find_hw = hw.clone();
    let find_or_create = vm.new_function("find_or_create", move |endpoints: Vec<u8>, vm: &VirtualMachine| -> PyResult<usize> {
        find_hw
            .borrow_mut()
            .bus_find_or_create(kind, &endpoints)
            .map_err(|e| vm.new_runtime_error(e.to_string()))
    });
    dict.set_item(format!("_{label}_find_or_create").as_str(), find_or_create.into(), vm)
        .expect("peripheral module dict is writable during bootstrap");

    let lock_hw = hw.clone();
    let try_lock = vm.new_function("try_lock", move |index: usize, vm: &VirtualMachine| -> PyResult<bool> {
        lock_hw
            .borrow_mut()
            .bus_try_lock(kind, index)
            .map_err(|e| vm.new_runtime_error(e.to_string()))
    });
    dict.set_item(format!("_{label}_try_lock").as_str(), try_lock.into(), vm).expect("peripheral module dict is writable during bootstrap");

    let unlock_hw = hw.clone();
    let unlock = vm.new_function("unlock", move |index: usize| {
        unlock_hw.borrow_mut().bus_unlock(kind, index);
    });
    dict.set_item(format!("_{label}_unlock").as_str(), unlock.into(), vm).expect("peripheral module dict is writable during bootstrap");

    let freq_hw = hw;
    let set_frequency = vm.new_function("set_frequency", move |index: usize, frequency: u32| {
        if let Some(bus) = freq_hw.borrow_mut().bus_mut(kind, index) {
            bus.frequency = frequency;
            bus.enabled = true;
        }
    });
    dict.set_item(format!("_{label}_set_frequency").as_str(), set_frequency.into(), vm)
        .expect("peripheral module dict is writable during bootstrap");
}

/// I2C-only `writeto`/`readfrom_into` backing functions: update the 128-slot
/// device register table and stamp a `last_transaction` (§3).
fn install_i2c_transfer(vm: &VirtualMachine, dict: &rustpython_vm::PyRef<PyDict>, hw: Rc<RefCell<HardwarePlane>>) {
    let write_hw = hw.clone();
    let write = vm.new_function(
        "_i2c_write",
        move |index: usize, address: u8, buffer: Vec<u8>, vm: &VirtualMachine| -> PyResult<()> {
            let mut plane = write_hw.borrow_mut();
            for (register, byte) in buffer.iter().enumerate() {
                plane
                    .i2c_device_set(index, address, register, *byte)
                    .map_err(|e| vm.new_runtime_error(e.to_string()))?;
            }
            plane.bus_record_transaction(BusKind::I2c, index, address, true, buffer.len() as u16);
            Ok(())
        },
    );
    dict.set_item("_i2c_write", write.into(), vm).expect("peripheral module dict is writable during bootstrap");

    let read_hw = hw;
    let read = vm.new_function(
        "_i2c_read",
        move |index: usize, address: u8, len: usize, vm: &VirtualMachine| -> PyResult<Vec<u8>> {
            let mut plane = read_hw.borrow_mut();
            let mut out = Vec::with_capacity(len);
            for register in 0..len {
                out.push(
                    plane
                        .i2c_device_get(index, address, register)
                        .map_err(|e| vm.new_runtime_error(e.to_string()))?,
                );
            }
            plane.bus_record_transaction(BusKind::I2c, index, address, false, len as u16);
            Ok(out)
        },
    );
    dict.set_item("_i2c_read", read.into(), vm).expect("peripheral module dict is writable during bootstrap");
}

#[cfg(test)]
mod tests {
    use super::*;
    use rustpython_vm::builtins::{PyBool, PyInt};
    use rustpython_vm::InterpreterConfig;

    fn to_i64(obj: &PyObjectRef) -> i64 {
        if let Some(b) = obj.downcast_ref::<PyBool>() {
            return b.as_bool() as i64;
        }
        if let Some(i) = obj.downcast_ref::<PyInt>() {
            return i.as_bigint().to_i64().expect("test value fits in i64");
        }
        panic!("expected an int-like result, got {}", obj.class().name());
    }

    /// Runs `source` against a fresh interpreter with `board`/`digitalio`/
    /// `analogio`/`busio` installed, then reads back each name in `results`
    /// from the module's globals.
    fn run(source: &str, hw: Rc<RefCell<HardwarePlane>>, results: &[&str]) -> Vec<i64> {
        let interp = InterpreterConfig::new().init_stdlib().interpreter();
        interp.enter(|vm| {
            install(vm, hw);
            let globals = vm.ctx.new_dict();
            let code = vm
                .compile(source, Mode::Exec, "<test>".to_owned())
                .expect("test source compiles");
            let scope = Scope::with_builtins(None, globals.clone(), vm);
            vm.run_code_obj(code, scope).unwrap_or_else(|e| {
                panic!(
                    "test source raised: {}",
                    vm.to_str(&e.into()).map(|s| s.as_str().to_string()).unwrap_or_default()
                )
            });
            results
                .iter()
                .map(|name| to_i64(&globals.get_item(*name, vm).expect("result name is set")))
                .collect()
        })
    }

    fn fresh_hw() -> Rc<RefCell<HardwarePlane>> {
        Rc::new(RefCell::new(HardwarePlane::new(48_000_000)))
    }

    #[test]
    fn board_exposes_d0_through_d63() {
        let hw = fresh_hw();
        let result = run("import board\n_result = board.D0", hw, &["_result"]);
        assert_eq!(result, vec![0]);
    }

    #[test]
    fn board_analog_aliases_trail_digital_pins() {
        let hw = fresh_hw();
        let result = run("import board\n_result = board.A0", hw, &["_result"]);
        assert_eq!(result, vec![(cpyhost_hwplane::layout::PIN_COUNT - 6) as i64]);
    }

    #[test]
    fn digitalio_defaults_to_input() {
        let hw = fresh_hw();
        let result = run(
            "import digitalio\npin = digitalio.DigitalInOut(3)\n_result = pin.direction",
            hw,
            &["_result"],
        );
        assert_eq!(result, vec![Direction::Input as i64]);
    }

    #[test]
    fn digitalio_output_write_is_visible_on_the_hardware_plane() {
        let hw = fresh_hw();
        let inspect = hw.clone();
        run(
            "import digitalio\nled = digitalio.DigitalInOut(5)\nled.switch_to_output(True)",
            hw,
            &[],
        );
        assert!(inspect.borrow().output_value(5), "S3: host must observe the guest's write");
    }

    #[test]
    fn digitalio_pull_round_trips_through_properties() {
        let hw = fresh_hw();
        let result = run(
            "import digitalio\npin = digitalio.DigitalInOut(7)\npin.pull = 1\n_result = pin.pull",
            hw,
            &["_result"],
        );
        assert_eq!(result, vec![Pull::Up as i64]);
    }

    #[test]
    fn digitalio_setting_value_on_an_input_pin_raises() {
        let hw = fresh_hw();
        let interp = InterpreterConfig::new().init_stdlib().interpreter();
        interp.enter(|vm| {
            install(vm, hw);
            let globals = vm.ctx.new_dict();
            let code = vm
                .compile(
                    "import digitalio\npin = digitalio.DigitalInOut(1)\npin.value = True",
                    Mode::Exec,
                    "<test>".to_owned(),
                )
                .expect("test source compiles");
            let scope = Scope::with_builtins(None, globals, vm);
            let err = vm
                .run_code_obj(code, scope)
                .expect_err("writing .value on an input pin must raise");
            assert_eq!(err.class().name().to_string(), "AttributeError");
        });
    }

    #[test]
    fn analogio_output_value_round_trips_16_bit() {
        let hw = fresh_hw();
        let inspect = hw.clone();
        let result = run(
            "import analogio\nimport board\ndac = analogio.AnalogOut(board.A0)\ndac.value = 12345\n_result = dac.value",
            hw,
            &["_result"],
        );
        assert_eq!(result, vec![12345]);
        assert_eq!(inspect.borrow().analog_output_value((cpyhost_hwplane::layout::PIN_COUNT - 6)), 12345);
    }

    #[test]
    fn analogio_input_reads_zero_before_any_host_write() {
        let hw = fresh_hw();
        let result = run(
            "import analogio\nimport board\nadc = analogio.AnalogIn(board.A1)\n_result = adc.value",
            hw,
            &["_result"],
        );
        assert_eq!(result, vec![0]);
    }

    #[test]
    fn busio_i2c_writeto_then_readfrom_into_round_trips_through_device_table() {
        let hw = fresh_hw();
        let result = run(
            r#"
import busio
import board
i2c = busio.I2C(board.D0, board.D1)
i2c.writeto(0x50, bytes([42]))
buf = bytearray(1)
i2c.readfrom_into(0x50, buf)
_result = buf[0]
"#,
            hw,
            &["_result"],
        );
        assert_eq!(result, vec![42]);
    }

    #[test]
    fn busio_i2c_try_lock_is_advisory_and_exclusive() {
        let hw = fresh_hw();
        let result = run(
            r#"
import busio
import board
bus = busio.I2C(board.D2, board.D3)
first = bus.try_lock()
second = bus.try_lock()
bus.unlock()
third = bus.try_lock()
_a = first
_b = second
_c = third
"#,
            hw,
            &["_a", "_b", "_c"],
        );
        assert_eq!(result, vec![1, 0, 1], "lock must be held until unlock (§5 bus locking)");
    }

    #[test]
    fn busio_spi_and_uart_find_or_create_do_not_collide_with_i2c() {
        let hw = fresh_hw();
        let result = run(
            r#"
import busio
import board
spi = busio.SPI(board.D10, board.D11, board.D12)
uart = busio.UART(board.D20, board.D21)
spi.configure(baudrate=1000000)
_a = spi.try_lock()
_b = uart is not None
"#,
            hw,
            &["_a", "_b"],
        );
        assert_eq!(result, vec![1, 1]);
    }
}
