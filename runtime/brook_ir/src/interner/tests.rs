use super::*;
use proptest::prelude::*;

#[test]
fn test_intern_same_text_same_symbol() {
    let table = SymbolTable::new();
    let a = table.intern("counter");
    let b = table.intern("counter");
    assert_eq!(a, b);
    assert_eq!(table.text_of(a), "counter");
}

#[test]
fn test_intern_distinct_texts() {
    let table = SymbolTable::new();
    let a = table.intern("increment");
    let b = table.intern("decrement");
    assert_ne!(a, b);
    assert_eq!(table.text_of(a), "increment");
    assert_eq!(table.text_of(b), "decrement");
}

#[test]
fn test_empty_string_is_symbol_zero() {
    let table = SymbolTable::new();
    assert_eq!(table.intern(""), Symbol::EMPTY);
    assert_eq!(table.text_of(Symbol::EMPTY), "");
}

#[test]
fn test_interning_empty_string_allocates_nothing() {
    let table = SymbolTable::new();
    let before = table.len();
    assert_eq!(table.intern_owned(String::new()), Symbol::EMPTY);
    assert_eq!(table.try_intern(""), Ok(Symbol::EMPTY));
    assert_eq!(table.len(), before);
}

#[test]
fn test_core_identifiers_are_pre_interned() {
    let table = SymbolTable::new();
    let before = table.len();
    table.intern("Object");
    table.intern("!!");
    table.intern("_wait");
    assert_eq!(table.len(), before);
}

#[test]
fn test_owned_and_borrowed_agree() {
    let table = SymbolTable::new();
    let owned = table.intern_owned(String::from("wait_then_set"));
    assert_eq!(table.intern("wait_then_set"), owned);
}

#[test]
fn test_invalid_symbol_has_no_text() {
    let table = SymbolTable::new();
    assert_eq!(table.try_text_of(Symbol::new(3, 0x00FF_FFFF)), None);
}

#[test]
#[should_panic(expected = "invalid symbol id")]
fn test_text_of_invalid_symbol_panics() {
    let table = SymbolTable::new();
    let _ = table.text_of(Symbol::new(3, 0x00FF_FFFF));
}

#[test]
fn test_len_counts_new_symbols_once() {
    let table = SymbolTable::new();
    let before = table.len();
    table.intern("fresh_name");
    table.intern("fresh_name");
    assert_eq!(table.len(), before + 1);
    assert!(!table.is_empty());
}

#[test]
fn test_shared_symbols_concurrent_interning() {
    let shared = SharedSymbols::new();
    let handles: Vec<_> = (0..4)
        .map(|t| {
            let table = shared.clone();
            std::thread::spawn(move || {
                (0..200)
                    .map(|i| table.intern(&format!("sym_{}", (i + t * 50) % 300)))
                    .collect::<Vec<_>>()
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
    for i in 0..300 {
        let text = format!("sym_{i}");
        let sym = shared.intern(&text);
        assert_eq!(shared.text_of(sym), text);
    }
    assert!(shared.same_table(&shared.clone()));
    assert!(!shared.same_table(&SharedSymbols::new()));
}

proptest! {
    #[test]
    fn prop_intern_is_a_bijection(
        texts in proptest::collection::vec(
            prop_oneof![Just(String::new()), "[a-z_!?]{0,12}"],
            1..64,
        )
    ) {
        let table = SymbolTable::new();
        let symbols: Vec<Symbol> = texts.iter().map(|t| table.intern(t)).collect();
        for (text, sym) in texts.iter().zip(&symbols) {
            prop_assert_eq!(table.text_of(*sym), text.as_str());
        }
        for (i, a) in texts.iter().enumerate() {
            for (j, b) in texts.iter().enumerate() {
                prop_assert_eq!(a == b, symbols[i] == symbols[j]);
            }
        }
    }
}
