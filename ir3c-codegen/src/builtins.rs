//! Runtime builtins emitted on demand (spec.md §6.3), ported from
//! `cgstate.CodegenState.require_*_function`/`get_*_function`.

pub const STRING_CONCAT: &str = "__string_concat";
pub const STRING_COMPARE: &str = "__string_compare";
pub const DIVIDE_INT: &str = "__divide_int";
pub const READLN_INT: &str = "__readln_int";
pub const READLN_BOOL: &str = "__readln_bool";
pub const READLN_STRING: &str = "__readln_string";

/// Hand-written assembly body for each builtin, keyed by name. Emitted
/// verbatim by the serializer for every name present in the program's
/// required-builtins set, in a fixed, deterministic order.
pub fn body(name: &str) -> &'static str {
    match name {
        STRING_CONCAT => STRING_CONCAT_BODY,
        STRING_COMPARE => STRING_COMPARE_BODY,
        DIVIDE_INT => DIVIDE_INT_BODY,
        READLN_INT => READLN_INT_BODY,
        READLN_BOOL => READLN_BOOL_BODY,
        READLN_STRING => READLN_STRING_BODY,
        other => panic!("unknown builtin `{other}`"),
    }
}

/// Emission order for the builtins section (spec.md §4.12): deterministic
/// and independent of `HashSet` iteration order.
pub const ORDER: [&str; 6] = [STRING_CONCAT, STRING_COMPARE, DIVIDE_INT, READLN_INT, READLN_BOOL, READLN_STRING];

const STRING_CONCAT_BODY: &str = r#".global __string_concat
.type __string_concat, %function
__string_concat:
	stmfd sp!, {v1, v2, v3, v4, v5, lr}
	mov v1, a1
	mov v2, a2

	cmp v1, #0
	bne .__string_concat_lhs_ok
	mov a1, v2
	b .__string_concat_done

.__string_concat_lhs_ok:
	cmp v2, #0
	bne .__string_concat_both_ok
	mov a1, v1
	b .__string_concat_done

.__string_concat_both_ok:
	ldr v3, [v1, #0]
	ldr v4, [v2, #0]
	add v5, v3, v4

	mov a1, #1
	add a2, v5, #5
	bl calloc(PLT)
	mov v1, a1

	str v5, [v1, #0]
	add a1, v1, #4
	add a2, v1, #0
	ldr a2, [v1, #0]
	bl memcpy(PLT)

	mov a1, v1
.__string_concat_done:
	ldmfd sp!, {v1, v2, v3, v4, v5, pc}
"#;

const STRING_COMPARE_BODY: &str = r#".global __string_compare
.type __string_compare, %function
__string_compare:
	stmfd sp!, {lr}
	cmp a1, a2
	moveq a1, #1
	beq .__string_compare_done

	cmp a1, #0
	moveq a1, #0
	beq .__string_compare_done
	cmp a2, #0
	moveq a1, #0
	beq .__string_compare_done

	add a1, a1, #4
	add a2, a2, #4
	bl strcmp(PLT)
	cmp a1, #0
	moveq a1, #1
	movne a1, #0

.__string_compare_done:
	ldmfd sp!, {pc}
"#;

const DIVIDE_INT_BODY: &str = r#".global __divide_int
.type __divide_int, %function
__divide_int:
	stmfd sp!, {v1, v2, v3, lr}
	mov v1, a1
	mov v2, a2

	cmp v2, #0
	moveq a1, #0
	beq .__divide_int_done

	mov v3, #0
	cmp v1, #0
	rsblt v1, v1, #0
	eorlt v3, v3, #1
	cmp v2, #0
	rsblt v2, v2, #0
	eorlt v3, v3, #1

	mov a1, #0
.__divide_int_loop:
	cmp v1, v2
	blt .__divide_int_finish
	sub v1, v1, v2
	add a1, a1, #1
	b .__divide_int_loop

.__divide_int_finish:
	cmp v3, #0
	rsbne a1, a1, #0

.__divide_int_done:
	ldmfd sp!, {v1, v2, v3, pc}
"#;

const READLN_INT_BODY: &str = r#".global __readln_int
.type __readln_int, %function
__readln_int:
	stmfd sp!, {v1, lr}
	sub sp, sp, #8
	mov v1, #0
	str v1, [sp, #0]

	mov a1, sp
	ldr a2, =.__readln_int_fmt
	bl scanf(PLT)

	ldr a1, [sp, #0]
	add sp, sp, #8
	ldmfd sp!, {v1, pc}

.data
.__readln_int_fmt:
	.asciz " %d "
.text
"#;

const READLN_BOOL_BODY: &str = r#".global __readln_bool
.type __readln_bool, %function
__readln_bool:
	stmfd sp!, {v1, lr}
	sub sp, sp, #8

	mov a1, sp
	ldr a2, =.__readln_bool_fmt
	bl scanf(PLT)

	ldrb v1, [sp, #0]
	mov a1, #0
	cmp v1, #'1'
	moveq a1, #1
	beq .__readln_bool_done
	cmp v1, #'T'
	moveq a1, #1
	beq .__readln_bool_done
	cmp v1, #'t'
	moveq a1, #1

.__readln_bool_done:
	add sp, sp, #8
	ldmfd sp!, {v1, pc}

.data
.__readln_bool_fmt:
	.asciz " %7s "
.text
"#;

const READLN_STRING_BODY: &str = r#".global __readln_string
.type __readln_string, %function
__readln_string:
	stmfd sp!, {v1, v2, lr}
	mov a1, #1
	mov a2, #261
	bl calloc(PLT)
	mov v1, a1

	add a1, v1, #4
	mov a2, #256
	ldr a3, =stdin
	ldr a3, [a3, #0]
	bl fgets(PLT)

	cmp a1, #0
	bne .__readln_string_got_line
	mov a1, #0
	b .__readln_string_done

.__readln_string_got_line:
	add a1, v1, #4
	bl strlen(PLT)
	mov v2, a1

	cmp v2, #0
	beq .__readln_string_no_trim
	add a1, v1, v2
	ldrb a2, [a1, #3]
	cmp a2, #'\n'
	bne .__readln_string_no_trim
	mov a2, #0
	strb a2, [a1, #3]
	sub v2, v2, #1

.__readln_string_no_trim:
	str v2, [v1, #0]
	mov a1, v1

.__readln_string_done:
	ldmfd sp!, {v1, v2, pc}
"#;
