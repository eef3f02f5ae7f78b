use crate::types::Type;

/// Mangle a method name per spec.md §3.6: `_J<C>_<f><P1>…<Pn>E`, where `C` is
/// the owning class's name and each `Pi` is a parameter's `Type::mangled()`
/// fragment (the implicit `this` receiver is not itself mangled in).
pub fn mangle_method(class_name: &str, fn_name: &str, param_types: &[Type]) -> String {
    let mut out = format!("_J{}_{}", class_name, fn_name);
    for ty in param_types {
        out.push_str(&ty.mangled());
    }
    out.push('E');
    out
}

/// Mangle a free (non-method) function the same way, using `Main` as the
/// owning "class" — the reference compiler desugars top-level `main` into a
/// method of a synthetic `Main` class before mangling.
pub fn mangle_function(fn_name: &str, param_types: &[Type]) -> String {
    mangle_method("Main", fn_name, param_types)
}

/// The user's `main` is renamed and emitted as the literal symbol
/// `main_dummy` — unlike every other method, it is exempted from
/// `mangle_method`/`mangle_function` entirely (spec.md §3.6: "the single
/// function named `main` is emitted as the literal symbol `main_dummy`").
/// The linker-visible `main` symbol is a hand-written wrapper that sets up
/// the initial stack frame and calls it (spec.md §3.6, §6.4).
pub const MAIN_DUMMY_NAME: &str = "main_dummy";
pub const MAIN_SYMBOL: &str = "main";

pub fn is_user_main(fn_name: &str) -> bool {
    fn_name == "main"
}
